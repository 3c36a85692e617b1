/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Name offered in the save dialog. The server produces MP3 for the audio
/// quality and MP4 for everything else.
pub fn suggested_filename(title: Option<&str>, quality: &str) -> String {
    let extension = if quality == "audio" { "mp3" } else { "mp4" };

    let stem = title
        .map(|t| {
            sanitize_filename(t)
                .trim_matches(|c| c == '.' || c == ' ')
                .to_string()
        })
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "video".to_string());

    format!("{}.{}", stem, extension)
}

/// `75.0` -> `1:15`, `3725.0` -> `1:02:05`
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

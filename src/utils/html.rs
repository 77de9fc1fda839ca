use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe formatting tags (like <b>, <sub>, <sup>) survive,
/// <script>/<iframe> and event-handler attributes are removed. Applied to
/// question text and explanations, whether typed by an admin or returned by
/// the AI service.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

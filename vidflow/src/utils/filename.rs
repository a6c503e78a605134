//! Filename helpers for generated outputs.

/// Turn a title into a lowercase, hyphen-separated filename slug.
///
/// Alphanumeric characters (including non-ASCII letters) are kept, everything
/// else collapses into single hyphens, and leading/trailing hyphens are
/// trimmed. Returns "untitled" if nothing survives.
///
/// # Examples
///
/// ```
/// use vidflow::utils::filename::slugify;
///
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("  Rust 2024: what's new?  "), "rust-2024-what-s-new");
/// assert_eq!(slugify("???"), "untitled");
/// ```
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_hyphen = true;

    for c in input.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Numbered article filename: `{sequence:03}-{slug}.md`.
pub fn numbered_markdown_name(sequence: usize, title: &str) -> String {
    format!("{:03}-{}.md", sequence, slugify(title))
}

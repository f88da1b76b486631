//! Small shared helpers: filesystem-safe names and page file extensions.

/// Replace characters that are unsafe in file or directory names.
pub fn sanitize_filename(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Extension for a page image URL, without the dot. Query strings are
/// stripped first; anything that is not a known image format falls back to
/// `jpg` so archive entries always carry a readable extension.
pub fn ext_from_url(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "jpg",
        "png" => "png",
        "webp" => "webp",
        "gif" => "gif",
        _ => "jpg",
    }
}

/// Turn a dash-separated URL slug into a display title.
pub fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_reserved_characters() {
        assert_eq!(sanitize_filename("Solo: Leveling?"), "Solo_ Leveling_");
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_filename("  "), "_");
    }

    #[test]
    fn ext_detection() {
        assert_eq!(ext_from_url("https://cdn.site/p/001.webp?v=2"), "webp");
        assert_eq!(ext_from_url("https://cdn.site/p/001.JPEG"), "jpg");
        assert_eq!(ext_from_url("https://cdn.site/p/noext"), "jpg");
        assert_eq!(ext_from_url("https://cdn.site/p/x.png#frag"), "png");
    }

    #[test]
    fn slug_titles() {
        assert_eq!(title_from_slug("solo-leveling"), "Solo Leveling");
        assert_eq!(title_from_slug("the-great--gatsby"), "The Great Gatsby");
    }
}

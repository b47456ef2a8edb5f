//! Filename sanitization (spec section 4.1).

const MAX_LEN: usize = 100;

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`, then truncates
/// to at most 100 characters, preserving the final `.ext` suffix where one
/// exists and fits.
pub fn sanitize_filename_for_linux(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    truncate_preserving_extension(&replaced, MAX_LEN)
}

fn truncate_preserving_extension(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }

    match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= max_len => {
            let ext = &name[dot..];
            let budget = max_len - ext.len();
            let mut take = budget;
            while take > 0 && !name.is_char_boundary(take) {
                take -= 1;
            }
            format!("{}{}", &name[..take], ext)
        }
        _ => {
            let mut take = max_len;
            while take > 0 && !name.is_char_boundary(take) {
                take -= 1;
            }
            name[..take].to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_slash_and_backslash() {
        assert_eq!(sanitize_filename_for_linux("a/b\\c.txt"), "a_b_c.txt");
    }

    #[test]
    fn replaces_spaces() {
        assert_eq!(sanitize_filename_for_linux("report final.pdf"), "report_final.pdf");
    }

    #[test]
    fn allows_dots_underscores_hyphens() {
        assert_eq!(
            sanitize_filename_for_linux("my-file_v1.2.tar.gz"),
            "my-file_v1.2.tar.gz"
        );
    }

    #[test]
    fn does_not_collapse_underscores() {
        assert_eq!(sanitize_filename_for_linux("a   b.txt"), "a___b.txt");
    }

    #[test]
    fn truncates_preserving_extension() {
        let long_name = format!("{}.txt", "a".repeat(150));
        let sanitized = sanitize_filename_for_linux(&long_name);
        assert!(sanitized.len() <= MAX_LEN);
        assert!(sanitized.ends_with(".txt"));
    }

    #[test]
    fn control_chars() {
        assert_eq!(sanitize_filename_for_linux("file\x00name.txt"), "file_name.txt");
    }
}

//! Naming conventions for subject types.

/// Last path segment of a type name: `App\Models\BlogPost` → `BlogPost`.
pub fn basename(subject_type: &str) -> &str {
    subject_type
        .rsplit(['\\', '/', ':', '.'])
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

/// Split an identifier into lowercase words on case changes, digit
/// boundaries, and separators.
fn words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = name.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if ch == '_' || ch == '-' || ch.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if ch.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            // "HTTPServer" splits as HTTP + Server
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }

        current.extend(ch.to_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Human-readable title of a type name: `App\Models\BlogPost` → `Blog Post`.
pub fn headline(subject_type: &str) -> String {
    words(basename(subject_type))
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `BlogPost` → `blog-post`.
pub fn kebab_case(name: &str) -> String {
    words(name).join("-")
}

/// English plural of a lowercase word, covering regular forms.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    let ends_with_any = |suffixes: &[&str]| suffixes.iter().any(|s| word.ends_with(s));

    if ends_with_any(&["s", "x", "z", "ch", "sh"]) {
        return format!("{word}es");
    }

    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last();
        if before.is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{stem}ies");
        }
    }

    format!("{word}s")
}

/// Resource route name for a subject type: the kebab-cased basename with
/// its last word pluralized. `App\Models\BlogCategory` → `blog-categories`.
pub fn resource_plural_name(subject_type: &str) -> String {
    let mut parts = words(basename(subject_type));
    if let Some(last) = parts.last_mut() {
        *last = pluralize(last);
    }
    parts.join("-")
}

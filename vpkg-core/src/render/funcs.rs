//! Case-conversion helpers callable from templates

/// Helper names, as written in templates
pub const FUNCTION_NAMES: &[&str] = &[
    "Title", "Camel", "Snake", "Kebab", "Upper", "Lower", "Pascal", "GoIdent",
];

pub fn is_function(name: &str) -> bool {
    FUNCTION_NAMES.contains(&name)
}

/// Apply helper `name` to `arg`; `None` for unknown helpers
pub fn call(name: &str, arg: &str) -> Option<String> {
    let out = match name {
        "Title" => to_title(arg),
        "Camel" => to_camel_case(arg),
        "Snake" => to_snake_case(arg),
        "Kebab" => to_kebab_case(arg),
        "Upper" => arg.to_uppercase(),
        "Lower" => arg.to_lowercase(),
        "Pascal" => to_pascal_case(arg),
        "GoIdent" => to_go_identifier(arg),
        _ => return None,
    };
    Some(out)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn split_words(s: &str) -> impl Iterator<Item = &str> {
    s.split(['_', '-', ' ']).filter(|w| !w.is_empty())
}

/// Upper-case the first letter of every space-separated word
pub fn to_title(s: &str) -> String {
    s.split(' ').map(capitalize).collect::<Vec<_>>().join(" ")
}

/// `redis-cache` → `RedisCache`
pub fn to_pascal_case(s: &str) -> String {
    split_words(s)
        .map(|w| capitalize(&w.to_lowercase()))
        .collect()
}

/// `redis-cache` → `redisCache`
pub fn to_camel_case(s: &str) -> String {
    let pascal = to_pascal_case(s);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `RedisCache` → `redis_cache`
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push('_');
        }
        out.push(c);
    }
    out.to_lowercase()
}

/// `RedisCache` / `redis_cache` → `redis-cache`
pub fn to_kebab_case(s: &str) -> String {
    to_snake_case(s)
        .split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var",
];

/// Lower-case Go package identifier: `Redis-Cache` → `rediscache`
pub fn to_go_identifier(s: &str) -> String {
    let mut ident: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase();

    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert_str(0, "pkg");
    }
    if GO_KEYWORDS.contains(&ident.as_str()) {
        ident.push_str("pkg");
    }
    ident
}

//! Text rendering utilities for human-friendly output.
//!
//! Everything here works on plain strings so the helpers stay usable from
//! error `Display` impls without pulling container types in.

/// Renders a dependency chain as a readable string.
///
/// # Examples
/// ```
/// use tarkib_support::rendering::render_chain;
///
/// let chain = vec!["Config", "RedisClient", "Config"];
/// assert_eq!(render_chain(&chain), "Config → RedisClient → Config");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    let mut out = String::new();
    for (i, step) in chain.iter().enumerate() {
        if i > 0 {
            out.push_str(" → ");
        }
        out.push_str(step.as_ref());
    }
    out
}

/// One line of a rendered construction plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLine {
    /// Short type name of the node
    pub type_name: String,
    /// What happens to the node (e.g. "root", "build", "supplied")
    pub role: String,
    /// Optional extra detail, such as the root field that supplies the value
    pub note: Option<String>,
}

/// Renders plan lines top to bottom, in construction order.
///
/// ```text
/// [supplied] RedisUri  (from: redis_uri)
///            ↓
/// [build   ] RedisClient
///            ↓
/// [root    ] Config
/// ```
pub fn render_plan(lines: &[PlanLine]) -> String {
    let width = lines.iter().map(|l| l.role.len()).max().unwrap_or(0);
    let mut result = String::new();

    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            result.push_str(&" ".repeat(width + 3));
            result.push_str("↓\n");
        }

        result.push_str(&format!("[{:<width$}] {}", line.role, line.type_name));
        if let Some(note) = &line.note {
            result.push_str(&format!("  ({note})"));
        }
        result.push('\n');
    }

    result
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use tarkib_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("my_app::net::RedisClient"), "RedisClient");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<my_app::net::RedisClient>"),
///     "Arc<RedisClient>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut chars = full_name.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Levenshtein distance between two strings, counted in chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggests names from `available` that are close to `requested`.
///
/// Candidates containing the requested name (or contained by it) rank first,
/// then candidates within an edit distance of a third of the longer name.
/// Best matches come first.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let wanted = requested.to_lowercase();

    let mut scored: Vec<(usize, &str)> = available
        .iter()
        .filter_map(|&name| {
            let candidate = name.to_lowercase();
            if candidate == wanted {
                return None;
            }
            if !wanted.is_empty() && (candidate.contains(&wanted) || wanted.contains(&candidate)) {
                return Some((0, name));
            }

            let distance = edit_distance(&wanted, &candidate);
            let budget = wanted.chars().count().max(candidate.chars().count()) / 3;
            (distance <= budget.max(1)).then_some((distance, name))
        })
        .collect();

    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(_, name)| name.to_string())
        .collect()
}

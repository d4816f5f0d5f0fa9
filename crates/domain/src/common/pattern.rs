use regex::{Regex, RegexBuilder};

/// Maximum compiled regex size (10 MiB).
pub const REGEX_SIZE_LIMIT: usize = 10 * (1 << 20);

/// Maximum regex nesting depth.
pub const REGEX_NEST_LIMIT: u32 = 200;

/// Compile a user-supplied pattern that must match the whole input.
pub fn compile_full_match(pattern: &str, ignore_case: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(ignore_case)
        .size_limit(REGEX_SIZE_LIMIT)
        .nest_limit(REGEX_NEST_LIMIT)
        .build()
}

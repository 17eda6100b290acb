/// Case-insensitive registry key for a source name.
pub fn canonical_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

//! RFC 5988 `Link` header parsing.

use std::collections::BTreeMap;

/// Parse a `Link` header into a map of relation name to target URL.
///
/// Entries without a `rel` parameter or with a malformed target are
/// skipped. When a relation appears twice the first target wins.
pub fn parse_link_header(value: &str) -> BTreeMap<String, String> {
  let mut links = BTreeMap::new();

  for entry in split_entries(value) {
    let entry = entry.trim();
    let Some(rest) = entry.strip_prefix('<') else {
      continue;
    };
    let Some(end) = rest.find('>') else {
      continue;
    };
    let target = rest[..end].trim();
    let params = &rest[end + 1..];

    for param in params.split(';') {
      let Some((name, value)) = param.split_once('=') else {
        continue;
      };
      if !name.trim().eq_ignore_ascii_case("rel") {
        continue;
      }
      // rel may hold several space-separated relation types
      for rel in value.trim().trim_matches('"').split_whitespace() {
        links
          .entry(rel.to_lowercase())
          .or_insert_with(|| target.to_string());
      }
    }
  }

  links
}

/// Target of the `next` relation, if present.
pub fn next_link(value: &str) -> Option<String> {
  parse_link_header(value).remove("next")
}

/// Split on commas that are outside `<...>`, since URLs may contain commas.
fn split_entries(value: &str) -> Vec<&str> {
  let mut entries = Vec::new();
  let mut depth = 0usize;
  let mut start = 0;

  for (i, c) in value.char_indices() {
    match c {
      '<' => depth += 1,
      '>' => depth = depth.saturating_sub(1),
      ',' if depth == 0 => {
        entries.push(&value[start..i]);
        start = i + 1;
      }
      _ => {}
    }
  }
  entries.push(&value[start..]);
  entries
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_github_style_header() {
    let header = "<https://api.github.com/repositories/1/pulls?page=2>; rel=\"next\", \
                  <https://api.github.com/repositories/1/pulls?page=5>; rel=\"last\"";
    let links = parse_link_header(header);

    assert_eq!(
      links.get("next").map(String::as_str),
      Some("https://api.github.com/repositories/1/pulls?page=2")
    );
    assert_eq!(
      links.get("last").map(String::as_str),
      Some("https://api.github.com/repositories/1/pulls?page=5")
    );
  }

  #[test]
  fn test_last_page_has_no_next() {
    let header = "<https://x.test/items?page=1>; rel=\"first\", <https://x.test/items?page=2>; rel=\"prev\"";
    assert_eq!(next_link(header), None);
  }

  #[test]
  fn test_multi_valued_rel_and_commas_in_url() {
    let header = "<https://x.test/a?ids=1,2,3>; rel=\"next last\"";
    let links = parse_link_header(header);

    assert_eq!(
      links.get("next").map(String::as_str),
      Some("https://x.test/a?ids=1,2,3")
    );
    assert!(links.contains_key("last"));
  }

  #[test]
  fn test_unquoted_rel_and_extra_params() {
    let header = "<https://x.test/b>; title=\"B\"; REL=next";
    assert_eq!(next_link(header).as_deref(), Some("https://x.test/b"));
  }

  #[test]
  fn test_malformed_entries_are_skipped() {
    assert!(parse_link_header("").is_empty());
    assert!(parse_link_header("https://x.test; rel=next").is_empty());
    assert!(parse_link_header("<https://x.test").is_empty());
  }
}

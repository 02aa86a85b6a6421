//! Wildcard host pattern compilation and matching.
//!
//! A pattern is a host with optional `*` wildcards (`*.example.com`). It
//! compiles to an anchored, case-insensitive regex over the full host.
//! Compiled patterns are memoized by their source string for the lifetime of
//! the process; a pattern that fails to compile is remembered as
//! never-matching so the failure is logged once and the dataplane keeps
//! running.

use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::prelude::*;

/// Translate a wildcard host pattern into an anchored, case-insensitive
/// regex. `*` becomes `.*`; every other regex metacharacter is escaped.
fn wildcard_to_regex(pattern: &str) -> String {
	let mut out = String::with_capacity(pattern.len() + 8);
	out.push_str("(?i)^");
	for c in pattern.chars() {
		match c {
			'*' => out.push_str(".*"),
			'.' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
				out.push('\\');
				out.push(c);
			}
			c => out.push(c),
		}
	}
	out.push('$');
	out
}

#[derive(Debug, Default)]
pub struct PatternMatcher {
	// None marks a pattern that failed to compile: matches nothing, logged once.
	compiled: Mutex<HashMap<Box<str>, Option<Regex>>>,
}

impl PatternMatcher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Match `host` against `pattern`, compiling and caching on first use.
	pub fn matches(&self, host: &str, pattern: &str) -> bool {
		let regex = self.compile(pattern);
		let matched = regex.as_ref().map(|re| re.is_match(host)).unwrap_or(false);
		trace!("Matching host {} against pattern {}: {}", host, pattern, matched);
		matched
	}

	fn compile(&self, pattern: &str) -> Option<Regex> {
		let mut compiled = match self.compiled.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		if let Some(regex) = compiled.get(pattern) {
			// Regex clones share the compiled program
			return regex.clone();
		}
		let regex = match Regex::new(&wildcard_to_regex(pattern)) {
			Ok(regex) => Some(regex),
			Err(err) => {
				warn!("Invalid ACL host pattern {:?}, treating as non-matching: {}", pattern, err);
				None
			}
		};
		compiled.insert(pattern.into(), regex.clone());
		regex
	}
}


// vim: ts=4

//! Structured generator namespaces.
//!
//! A complete namespace has the shape
//! `(@scope/)?name(:generator-path)?(@semver@)?(+instanceId)?(#method)?(flag)?`,
//! e.g. `@scope/node:app:service@^1.0.0@+2#run!`. Parsing is a single
//! left-to-right pass; a string that does not match the grammar yields `None`
//! rather than an error, so callers can fall back to path-based resolution.

use crate::error::{GenscopeError, Result};
use heck::ToLowerCamelCase;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Trailing control flag of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamespaceFlag {
    /// `!` — install the package if it is missing.
    Install,
    /// `!?` — load the package only if it is already present.
    Load,
    /// `?` — the namespace is optional.
    Optional,
}

impl NamespaceFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceFlag::Install => "!",
            NamespaceFlag::Load => "!?",
            NamespaceFlag::Optional => "?",
        }
    }

    pub fn parse(s: &str) -> Option<NamespaceFlag> {
        match s {
            "!" => Some(NamespaceFlag::Install),
            "!?" => Some(NamespaceFlag::Load),
            "?" => Some(NamespaceFlag::Optional),
            _ => None,
        }
    }
}

/// A parsed generator namespace.
///
/// `unscoped` is always non-empty once parsed; `scope`, if present, carries
/// its leading `@`. The value round-trips: `Namespace::parse(ns.complete())`
/// re-parses equal for every populated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub scope: Option<String>,
    pub unscoped: String,
    /// Colon-separated sub-generator path segments, in order.
    pub generator: Vec<String>,
    pub semver: Option<String>,
    pub instance_id: Option<String>,
    pub method: Option<String>,
    pub flags: Option<NamespaceFlag>,
}

fn is_segment_start(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '~'
}

fn is_segment_char(c: char) -> bool {
    is_segment_start(c) || c == '.' || c == '_'
}

fn is_semver_char(c: char) -> bool {
    c.is_ascii_lowercase()
        || c.is_ascii_digit()
        || matches!(c, '-' | '.' | '~' | '>' | '<' | '+' | '=' | '^' | '*' | ' ')
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Cursor { rest: input }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if let Some(stripped) = self.rest.strip_prefix(c) {
            self.rest = stripped;
            true
        } else {
            false
        }
    }

    /// Consume one `[a-z0-9-~][a-z0-9-._~]*` segment, or nothing.
    fn take_segment(&mut self) -> Option<&'a str> {
        if !self.peek().is_some_and(is_segment_start) {
            return None;
        }
        let end = self
            .rest
            .find(|c| !is_segment_char(c))
            .unwrap_or(self.rest.len());
        let (seg, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(seg)
    }

    fn take_while(&mut self, pred: fn(char) -> bool) -> &'a str {
        let end = self.rest.find(|c| !pred(c)).unwrap_or(self.rest.len());
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        taken
    }
}

impl Namespace {
    /// Parse a complete namespace string. Returns `None` when the input does
    /// not match the grammar; callers treat that as "not a namespace".
    pub fn parse(complete: &str) -> Option<Namespace> {
        let mut cur = Cursor::new(complete);

        let scope = if cur.peek() == Some('@') {
            cur.eat('@');
            let body = cur.take_segment()?;
            if !cur.eat('/') {
                return None;
            }
            Some(format!("@{body}"))
        } else {
            None
        };

        let unscoped = cur.take_segment()?.to_string();

        let mut generator = Vec::new();
        if cur.eat(':') {
            // A dangling `:` is tolerated, matching the historical grammar.
            while let Some(seg) = cur.take_segment() {
                generator.push(seg.to_string());
                if !cur.eat(':') {
                    break;
                }
            }
        }

        let semver = if cur.eat('@') {
            let pin = cur.take_while(is_semver_char);
            if !cur.eat('@') {
                return None;
            }
            (!pin.is_empty()).then(|| pin.to_string())
        } else {
            None
        };

        let instance_id = if cur.eat('+') {
            let mut ids = Vec::new();
            while let Some(seg) = cur.take_segment() {
                ids.push(seg);
                if !cur.eat('+') {
                    break;
                }
            }
            (!ids.is_empty()).then(|| ids.join("+"))
        } else {
            None
        };

        let method = if cur.eat('#') {
            Some(cur.take_segment()?.to_string())
        } else {
            None
        };

        let flags = match cur.rest {
            "" => None,
            rest => Some(NamespaceFlag::parse(rest)?),
        };

        let parsed = Namespace {
            scope,
            unscoped,
            generator,
            semver,
            instance_id,
            method,
            flags,
        };
        debug!(namespace = %complete, parsed = ?parsed, "parsed namespace");
        Some(parsed)
    }

    /// Parse a namespace, converting a grammar mismatch into a typed error.
    pub fn require(complete: &str) -> Result<Namespace> {
        Namespace::parse(complete)
            .ok_or_else(|| GenscopeError::InvalidNamespace(complete.to_string()))
    }

    fn scope_addition(&self) -> String {
        self.scope
            .as_deref()
            .map(|s| format!("{s}/"))
            .unwrap_or_default()
    }

    fn generator_addition(&self) -> String {
        if self.generator.is_empty() {
            String::new()
        } else {
            format!(":{}", self.generator.join(":"))
        }
    }

    fn semver_addition(&self) -> String {
        self.semver
            .as_deref()
            .map(|s| format!("@{s}@"))
            .unwrap_or_default()
    }

    fn id_addition(&self) -> String {
        self.instance_id
            .as_deref()
            .map(|id| format!("+{id}"))
            .unwrap_or_default()
    }

    fn method_addition(&self) -> String {
        self.method
            .as_deref()
            .map(|m| format!("#{m}"))
            .unwrap_or_default()
    }

    /// `@scope/name` (or `name` when unscoped).
    pub fn package_namespace(&self) -> String {
        format!("{}{}", self.scope_addition(), self.unscoped)
    }

    /// `@scope/name:generator:path` — the lookup key used by the registry.
    pub fn namespace(&self) -> String {
        format!("{}{}", self.package_namespace(), self.generator_addition())
    }

    /// Namespace plus instance id, `@scope/name:app+2`.
    pub fn id(&self) -> String {
        format!("{}{}", self.namespace(), self.id_addition())
    }

    /// The canonical serialization, including version pin, instance id,
    /// method and control flag.
    pub fn complete(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.namespace(),
            self.semver_addition(),
            self.id_addition(),
            self.method_addition(),
            self.flags.map(|f| f.as_str()).unwrap_or_default()
        )
    }

    /// Name of the npm package expected to provide this namespace.
    pub fn generator_hint(&self) -> String {
        format!("{}gen-{}", self.scope_addition(), self.unscoped)
    }

    /// Generator hint with the version pin attached, for install prompts.
    pub fn versioned_hint(&self) -> String {
        match self.semver.as_deref() {
            Some(semver) => format!("{}@\"{}\"", self.generator_hint(), semver),
            None => self.generator_hint(),
        }
    }

    /// Camel-cased accessor name for the invocation method, e.g.
    /// `#do-something` yields `doSomething#`.
    pub fn method_name(&self) -> Option<String> {
        self.method
            .as_deref()
            .map(|m| format!("{}#", m.to_lower_camel_case()))
    }

    pub fn install(&self) -> bool {
        self.flags == Some(NamespaceFlag::Install)
    }

    pub fn load(&self) -> bool {
        self.flags == Some(NamespaceFlag::Load)
    }

    pub fn optional(&self) -> bool {
        self.flags == Some(NamespaceFlag::Optional)
    }

    /// Re-parse `namespace` and merge it into this value: fields present in
    /// the new string overwrite, absent fields are left untouched.
    pub fn set_namespace(&mut self, namespace: &str) -> Result<()> {
        let parsed = Namespace::require(namespace)?;
        if parsed.scope.is_some() {
            self.scope = parsed.scope;
        }
        self.unscoped = parsed.unscoped;
        if !parsed.generator.is_empty() {
            self.generator = parsed.generator;
        }
        if parsed.semver.is_some() {
            self.semver = parsed.semver;
        }
        if parsed.instance_id.is_some() {
            self.instance_id = parsed.instance_id;
        }
        if parsed.method.is_some() {
            self.method = parsed.method;
        }
        if parsed.flags.is_some() {
            self.flags = parsed.flags;
        }
        Ok(())
    }

    /// Advance the instance id: unset becomes `1`; a trailing numeric segment
    /// is incremented; a non-numeric or zero-leading segment is kept and a
    /// fresh `1` segment is appended instead.
    pub fn bump_id(&mut self) {
        let Some(id) = self.instance_id.as_deref() else {
            self.instance_id = Some("1".to_string());
            return;
        };
        let mut ids: Vec<String> = id.split('+').map(str::to_string).collect();
        let last = ids.pop().unwrap_or_default();
        match last.parse::<u64>() {
            Ok(n) if !last.starts_with('0') => ids.push((n + 1).to_string()),
            _ => {
                ids.push(last);
                ids.push("1".to_string());
            }
        }
        self.instance_id = Some(ids.join("+"));
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.complete())
    }
}

/// Package-level name of a namespace: everything before the first `:`.
pub fn namespace_to_name(namespace: &str) -> &str {
    namespace.split(':').next().unwrap_or(namespace)
}

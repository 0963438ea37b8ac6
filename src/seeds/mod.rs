//! Seed packs: knowledge bootstrapping for an interpreter.
//!
//! A seed pack is a TOML-defined bundle of `(= pattern body)` rules that can be
//! applied to an interpreter's knowledge base. One pack is bundled into the
//! binary: `regions`. More are discovered from `<seeds_dir>/<pack>/seed.toml`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::PoisonError;

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::atom::Atom;
use crate::interpreter::Interpreter;
use crate::parse::parse_atom;
use crate::space::Rule;

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug, Error, Diagnostic)]
pub enum SeedError {
    #[error("seed pack not found: \"{id}\"")]
    #[diagnostic(
        code(piper::seed::not_found),
        help("List available packs with `piper seed list`, or pass `--seeds-dir` to scan another directory.")
    )]
    NotFound { id: String },

    #[error("failed to parse seed pack \"{id}\": {message}")]
    #[diagnostic(
        code(piper::seed::parse),
        help("Check the seed.toml syntax: a [seed] table plus [[rules]] entries with an `atom` key.")
    )]
    Parse { id: String, message: String },

    #[error("failed to read seed file: {path}")]
    #[diagnostic(code(piper::seed::io), help("Ensure the file exists and is readable."))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid rule in seed \"{id}\": {atom}: {message}")]
    #[diagnostic(
        code(piper::seed::invalid_rule),
        help("Every rule must be a single atom of the form `(= pattern body)`.")
    )]
    InvalidRule {
        id: String,
        atom: String,
        message: String,
    },
}

pub type SeedResult<T> = std::result::Result<T, SeedError>;

// ── Seed pack data model ────────────────────────────────────────────────

/// A seed pack: TOML-defined rule bundle.
#[derive(Debug, Clone)]
pub struct SeedPack {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub rules: Vec<SeedRule>,
    /// Source: `Bundled` or `External(path)`.
    pub source: SeedSource,
}

/// Where a seed pack came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    /// Bundled into the binary via `include_str!`.
    Bundled,
    /// Loaded from an external directory.
    External(PathBuf),
}

/// A rule in a seed pack, in surface syntax.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedRule {
    pub atom: String,
}

/// Report after applying a seed pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub id: String,
    pub rules_applied: usize,
    pub already_applied: bool,
}

// ── TOML deserialization helpers ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SeedToml {
    seed: SeedMeta,
    #[serde(default)]
    rules: Vec<SeedRule>,
}

#[derive(Debug, Deserialize)]
struct SeedMeta {
    id: String,
    name: String,
    version: String,
    #[serde(default)]
    description: String,
}

// ── Bundled seed packs ──────────────────────────────────────────────────

const REGIONS_TOML: &str = include_str!("../../data/seeds/regions/seed.toml");

fn parse_seed_toml(toml_str: &str, source: SeedSource) -> SeedResult<SeedPack> {
    let parsed: SeedToml = toml::from_str(toml_str).map_err(|e| SeedError::Parse {
        id: "(unknown)".into(),
        message: e.to_string(),
    })?;
    Ok(SeedPack {
        id: parsed.seed.id,
        name: parsed.seed.name,
        version: parsed.seed.version,
        description: parsed.seed.description,
        rules: parsed.rules,
        source,
    })
}

fn bundled_packs() -> Vec<SeedPack> {
    [(REGIONS_TOML, "regions")]
        .iter()
        .filter_map(
            |(toml, id)| match parse_seed_toml(toml, SeedSource::Bundled) {
                Ok(pack) => Some(pack),
                Err(e) => {
                    tracing::warn!(seed = id, "Failed to parse bundled seed: {e}");
                    None
                }
            },
        )
        .collect()
}

// ── Seed Registry ───────────────────────────────────────────────────────

/// Registry of available seed packs (bundled + discovered from disk).
#[derive(Debug, Clone)]
pub struct SeedRegistry {
    packs: HashMap<String, SeedPack>,
}

impl SeedRegistry {
    /// Create a registry with only bundled packs.
    pub fn bundled() -> Self {
        let packs = bundled_packs()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        Self { packs }
    }

    /// Discover seed packs from a directory (in addition to bundled packs).
    ///
    /// Each subdirectory containing a `seed.toml` is loaded as a pack. A
    /// discovered pack replaces a bundled pack with the same ID.
    pub fn discover(seeds_dir: &Path) -> Self {
        let mut registry = Self::bundled();

        let Ok(entries) = std::fs::read_dir(seeds_dir) else {
            tracing::debug!(dir = %seeds_dir.display(), "no seeds directory");
            return registry;
        };
        for entry in entries.flatten() {
            let seed_file = entry.path().join("seed.toml");
            if !seed_file.is_file() {
                continue;
            }
            match load_seed_file(&seed_file, entry.path()) {
                Ok(pack) => {
                    tracing::debug!(seed = %pack.id, rules = pack.rules.len(), "seed pack discovered");
                    registry.packs.insert(pack.id.clone(), pack);
                }
                Err(e) => {
                    tracing::warn!(path = %seed_file.display(), "Failed to load seed pack: {e}");
                }
            }
        }

        registry
    }

    /// List all available seed packs.
    pub fn list(&self) -> Vec<&SeedPack> {
        let mut packs: Vec<&SeedPack> = self.packs.values().collect();
        packs.sort_by(|a, b| a.id.cmp(&b.id));
        packs
    }

    /// Get a seed pack by ID.
    pub fn get(&self, id: &str) -> SeedResult<&SeedPack> {
        self.packs
            .get(id)
            .ok_or_else(|| SeedError::NotFound { id: id.to_string() })
    }

    /// Apply a single seed pack. Idempotent via a `(seed-applied <id>)` marker rule.
    pub fn apply(&self, pack_id: &str, interpreter: &Interpreter) -> SeedResult<SeedReport> {
        let pack = self.get(pack_id)?;
        apply_seed_pack(pack, interpreter)
    }

    /// Apply multiple seed packs. Returns a report per pack.
    pub fn apply_all(
        &self,
        pack_ids: &[String],
        interpreter: &Interpreter,
    ) -> SeedResult<Vec<SeedReport>> {
        let mut reports = Vec::new();
        for id in pack_ids {
            reports.push(self.apply(id, interpreter)?);
        }
        Ok(reports)
    }
}

fn load_seed_file(seed_file: &Path, dir: PathBuf) -> SeedResult<SeedPack> {
    let content = std::fs::read_to_string(seed_file).map_err(|e| SeedError::Io {
        path: seed_file.display().to_string(),
        source: e,
    })?;
    parse_seed_toml(&content, SeedSource::External(dir))
}

// ── Application logic ───────────────────────────────────────────────────

/// Head symbol of the marker rule recording an applied seed.
const SEED_APPLIED: &str = "seed-applied";

fn marker_pattern(seed_id: &str) -> Atom {
    Atom::expr(vec![Atom::sym(SEED_APPLIED), Atom::sym(seed_id)])
}

/// Check if a seed pack has already been applied to this interpreter.
pub fn is_seed_applied(interpreter: &Interpreter, seed_id: &str) -> bool {
    let marker = marker_pattern(seed_id);
    interpreter
        .space()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .rules()
        .iter()
        .any(|rule| rule.pattern == marker)
}

/// Parse every rule of a pack without touching any knowledge base.
fn parse_rules(pack: &SeedPack) -> SeedResult<Vec<Rule>> {
    pack.rules
        .iter()
        .map(|seed_rule| {
            let invalid = |message: String| SeedError::InvalidRule {
                id: pack.id.clone(),
                atom: seed_rule.atom.clone(),
                message,
            };
            let atom = parse_atom(&seed_rule.atom).map_err(|e| invalid(e.to_string()))?;
            Rule::from_equality(&atom).map_err(|e| invalid(e.to_string()))
        })
        .collect()
}

/// Apply a seed pack's rules. A pack with any malformed rule adds nothing.
///
/// The marker check and every append happen under one write lock, so
/// concurrent applications insert a pack once and readers never see part of it.
fn apply_seed_pack(pack: &SeedPack, interpreter: &Interpreter) -> SeedResult<SeedReport> {
    let rules = parse_rules(pack)?;
    let marker = marker_pattern(&pack.id);

    let mut kb = interpreter
        .space()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if kb.rules().iter().any(|rule| rule.pattern == marker) {
        tracing::debug!(seed = %pack.id, "seed already applied");
        return Ok(SeedReport {
            id: pack.id.clone(),
            rules_applied: 0,
            already_applied: true,
        });
    }

    let applied = rules.len();
    for rule in rules {
        kb.add_atom(rule);
    }
    kb.add_atom(Rule::new(marker, Atom::true_atom()));
    drop(kb);

    tracing::info!(seed = %pack.id, rules = applied, "seed pack applied");
    Ok(SeedReport {
        id: pack.id.clone(),
        rules_applied: applied,
        already_applied: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_packs_parse() {
        let packs = bundled_packs();
        assert_eq!(packs.len(), 1);
        let regions = &packs[0];
        assert_eq!(regions.id, "regions");
        assert_eq!(regions.source, SeedSource::Bundled);
        assert_eq!(regions.rules.len(), 11);
    }

    #[test]
    fn registry_lists_bundled() {
        let reg = SeedRegistry::bundled();
        let ids: Vec<&str> = reg.list().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["regions"]);
        assert!(matches!(reg.get("nope"), Err(SeedError::NotFound { .. })));
    }

    #[test]
    fn concurrent_applications_insert_a_pack_once() {
        let interp = Interpreter::default();
        let reg = SeedRegistry::bundled();
        let reports: Vec<SeedReport> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| reg.apply("regions", &interp).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let fresh = reports.iter().filter(|r| !r.already_applied).count();
        assert_eq!(fresh, 1);
        assert_eq!(interp.space().read().unwrap().len(), 12);
    }

    #[test]
    fn apply_regions_seed() {
        let interp = Interpreter::default();
        let reg = SeedRegistry::bundled();

        let report = reg.apply("regions", &interp).unwrap();
        assert!(!report.already_applied);
        assert_eq!(report.rules_applied, 11);
        assert!(is_seed_applied(&interp, "regions"));

        let weight = interp.eval(&parse_atom("(allocation_weight HIGH)").unwrap());
        assert_eq!(weight, Atom::sym("0.30"));

        // Idempotent.
        let again = reg.apply("regions", &interp).unwrap();
        assert!(again.already_applied);
        assert_eq!(again.rules_applied, 0);
        assert_eq!(interp.space().read().unwrap().len(), 12);
    }

    #[test]
    fn malformed_rule_rejects_whole_pack() {
        let pack = parse_seed_toml(
            r#"
            [seed]
            id = "broken"
            name = "Broken"
            version = "0.0.1"

            [[rules]]
            atom = "(= (ok) yes)"

            [[rules]]
            atom = "(not-a-rule)"
            "#,
            SeedSource::Bundled,
        )
        .unwrap();
        let interp = Interpreter::default();
        let err = apply_seed_pack(&pack, &interp).unwrap_err();
        assert!(matches!(err, SeedError::InvalidRule { .. }));
        assert!(interp.space().read().unwrap().is_empty());
    }

    #[test]
    fn discover_loads_external_packs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pack_dir = tmp.path().join("extra");
        std::fs::create_dir_all(&pack_dir).unwrap();
        std::fs::write(
            pack_dir.join("seed.toml"),
            r#"
            [seed]
            id = "extra"
            name = "Extra"
            version = "1.0.0"
            description = "test pack"

            [[rules]]
            atom = "(= (budget) 1000000)"
            "#,
        )
        .unwrap();
        // Broken packs are skipped, not fatal.
        let bad_dir = tmp.path().join("bad");
        std::fs::create_dir_all(&bad_dir).unwrap();
        std::fs::write(bad_dir.join("seed.toml"), "not toml [").unwrap();

        let reg = SeedRegistry::discover(tmp.path());
        assert_eq!(reg.list().len(), 2);
        let extra = reg.get("extra").unwrap();
        assert_eq!(extra.source, SeedSource::External(pack_dir));

        let interp = Interpreter::default();
        reg.apply_all(&["extra".to_string()], &interp).unwrap();
        assert_eq!(
            interp.eval(&parse_atom("(budget)").unwrap()),
            Atom::sym("1000000")
        );
    }

    #[test]
    fn discover_missing_dir_falls_back_to_bundled() {
        let reg = SeedRegistry::discover(Path::new("/nonexistent/piper/seeds"));
        assert_eq!(reg.list().len(), 1);
    }
}

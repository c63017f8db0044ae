use clap::ValueEnum;
use guidfix_core::{CollisionPolicy, ScriptAssignment, StrategyKind, WriteMode};

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum ExtractFlag {
    Marker,
    Offset,
}

impl ExtractFlag {
    pub(crate) const fn as_domain(self) -> StrategyKind {
        match self {
            ExtractFlag::Marker => StrategyKind::Marker,
            ExtractFlag::Offset => StrategyKind::Offset,
        }
    }
}

pub(crate) const fn write_mode(atomic: bool) -> Option<WriteMode> {
    if atomic {
        Some(WriteMode::Atomic)
    } else {
        None
    }
}

pub(crate) const fn collision_policy(strict: bool) -> Option<CollisionPolicy> {
    if strict {
        Some(CollisionPolicy::Reject)
    } else {
        None
    }
}

/// `--assign <ID>=<SCRIPT>`: a missing identifier and the script (or its
/// descriptor) that should own it
pub(crate) fn parse_assignment(raw: &str) -> Result<ScriptAssignment, String> {
    let (id, script) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <ID>=<SCRIPT>, got `{raw}`"))?;
    let id = id.trim();
    let script = script.trim().trim_matches('"');
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("`{id}` is not a hexadecimal identifier"));
    }
    if script.is_empty() {
        return Err("script path is empty".to_string());
    }
    Ok(ScriptAssignment::new(id, script))
}

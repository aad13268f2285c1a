//! Process-wide debug overrides.
//!
//! The overrides are read once from the environment and then travel inside
//! [`DeviceCapabilities`](crate::capabilities::DeviceCapabilities) as an
//! immutable snapshot. Nothing here is consulted lazily or globally.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Force inline assembly for xdlops instructions.
pub const XDLOPS_INLINE_ASM_ENV: &str = "CONVFORGE_DEBUG_XDLOPS_INLINE_ASM";
/// Treat xdlops as available and emulate them in software.
pub const XDLOPS_EMULATE_ENV: &str = "CONVFORGE_DEBUG_XDLOPS_EMULATE";
/// Set to an off value to hide xdlops from every solver.
pub const XDLOPS_ENV: &str = "CONVFORGE_DEBUG_XDLOPS";
/// Set to an off value to stop emitting non-xdlops inline assembly.
pub const NON_XDLOPS_INLINE_ASM_ENV: &str = "CONVFORGE_DEBUG_NON_XDLOPS_INLINE_ASM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebugFlags {
    pub xdlops_inline_asm: bool,
    pub xdlops_emulate: bool,
    pub xdlops_disabled: bool,
    pub non_xdlops_inline_asm_disabled: bool,
}

impl DebugFlags {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve the overrides through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let toggle = |name: &'static str| -> Result<Option<bool>, ConfigError> {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .map(|value| parse_toggle(name, &value))
                .transpose()
        };

        let flags = Self {
            xdlops_inline_asm: toggle(XDLOPS_INLINE_ASM_ENV)?.unwrap_or(false),
            xdlops_emulate: toggle(XDLOPS_EMULATE_ENV)?.unwrap_or(false),
            xdlops_disabled: toggle(XDLOPS_ENV)? == Some(false),
            non_xdlops_inline_asm_disabled: toggle(NON_XDLOPS_INLINE_ASM_ENV)? == Some(false),
        };
        debug!(
            xdlops_inline_asm = flags.xdlops_inline_asm,
            xdlops_emulate = flags.xdlops_emulate,
            xdlops_disabled = flags.xdlops_disabled,
            non_xdlops_inline_asm_disabled = flags.non_xdlops_inline_asm_disabled,
            "resolved debug overrides"
        );
        Ok(flags)
    }
}

fn parse_toggle(variable: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "yes" | "true" | "enabled" => Ok(true),
        "0" | "off" | "no" | "false" | "disabled" => Ok(false),
        _ => Err(ConfigError::InvalidToggle {
            variable,
            value: raw.to_string(),
        }),
    }
}

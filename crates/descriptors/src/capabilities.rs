//! Target device capabilities.

use crate::config::DebugFlags;
use crate::problem::DataType;
use serde::{Deserialize, Serialize};

/// Code-object metadata version understood by the assembler toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MetadataVersion {
    V1,
    V2,
    #[default]
    V3,
}

impl MetadataVersion {
    pub fn code(&self) -> usize {
        match self {
            MetadataVersion::V1 => 1,
            MetadataVersion::V2 => 2,
            MetadataVersion::V3 => 3,
        }
    }
}

/// Immutable description of the target device, its toolchain and the
/// debug overrides in force for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Architecture name as reported by the runtime, e.g. `gfx908`.
    pub arch: String,
    pub assembler_available: bool,
    /// Accelerated matrix-multiply (xdlops) instructions.
    pub xdlops: bool,
    pub atomic_add_reduced_precision: bool,
    pub metadata_version: MetadataVersion,
    /// Extra compiler flags appended by source-compiled solvers.
    pub general_compile_options: Vec<String>,
    pub debug: DebugFlags,
}

impl DeviceCapabilities {
    /// Capabilities inferred from the architecture name alone.
    pub fn for_arch(arch: impl Into<String>) -> Self {
        let arch = arch.into();
        let xdlops = arch.starts_with("gfx908");
        Self {
            arch,
            assembler_available: true,
            xdlops,
            atomic_add_reduced_precision: false,
            metadata_version: MetadataVersion::default(),
            general_compile_options: Vec::new(),
            debug: DebugFlags::default(),
        }
    }

    pub fn with_assembler(mut self, available: bool) -> Self {
        self.assembler_available = available;
        self
    }

    pub fn with_xdlops(mut self, xdlops: bool) -> Self {
        self.xdlops = xdlops;
        self
    }

    pub fn with_atomic_add_reduced_precision(mut self, supported: bool) -> Self {
        self.atomic_add_reduced_precision = supported;
        self
    }

    pub fn with_metadata_version(mut self, version: MetadataVersion) -> Self {
        self.metadata_version = version;
        self
    }

    pub fn with_general_compile_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.general_compile_options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_debug(mut self, debug: DebugFlags) -> Self {
        self.debug = debug;
        self
    }

    /// Whether xdlops may be used, after debug overrides.
    pub fn xdlops_enabled(&self) -> bool {
        self.debug.xdlops_emulate || (self.xdlops && !self.debug.xdlops_disabled)
    }

    /// Whether threadwise GEMM code may use inline assembly for `dtype`.
    pub fn use_inline_asm(&self, dtype: DataType) -> bool {
        if self.arch.starts_with("gfx8") {
            return false;
        }
        if self.arch.starts_with("gfx9") && dtype == DataType::BF16 {
            return false;
        }
        !self.debug.non_xdlops_inline_asm_disabled
    }

    pub fn use_buffer_atomic_add(&self) -> bool {
        self.atomic_add_reduced_precision
    }

    /// Number of `dtype` elements packed into one accumulator slot.
    pub fn element_pack_length(&self, dtype: DataType) -> usize {
        match dtype {
            DataType::F32 => 1,
            DataType::F16 if self.xdlops_enabled() => 4,
            DataType::F16 | DataType::BF16 => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arch_defaults_follow_the_device_family() {
        let mi100 = DeviceCapabilities::for_arch("gfx908");
        assert!(mi100.xdlops_enabled());
        assert!(!mi100.use_buffer_atomic_add());

        let vega = DeviceCapabilities::for_arch("gfx900");
        assert!(!vega.xdlops_enabled());
        assert_eq!(vega.metadata_version.code(), 3);
    }

    #[test]
    fn debug_overrides_gate_xdlops() {
        let disabled = DeviceCapabilities::for_arch("gfx908").with_debug(DebugFlags {
            xdlops_disabled: true,
            ..DebugFlags::default()
        });
        assert!(!disabled.xdlops_enabled());

        let emulated = DeviceCapabilities::for_arch("gfx900").with_debug(DebugFlags {
            xdlops_emulate: true,
            ..DebugFlags::default()
        });
        assert!(emulated.xdlops_enabled());
    }

    #[test]
    fn element_pack_length_depends_on_dtype_and_xdlops() {
        let xdlops = DeviceCapabilities::for_arch("gfx908");
        let plain = DeviceCapabilities::for_arch("gfx906");
        assert_eq!(xdlops.element_pack_length(DataType::F32), 1);
        assert_eq!(xdlops.element_pack_length(DataType::F16), 4);
        assert_eq!(plain.element_pack_length(DataType::F16), 2);
        assert_eq!(xdlops.element_pack_length(DataType::BF16), 2);
    }

    #[test]
    fn inline_asm_is_off_for_gfx8_and_gfx9_bf16() {
        assert!(!DeviceCapabilities::for_arch("gfx803").use_inline_asm(DataType::F32));
        let gfx908 = DeviceCapabilities::for_arch("gfx908");
        assert!(!gfx908.use_inline_asm(DataType::BF16));
        assert!(gfx908.use_inline_asm(DataType::F16));
        let overridden = gfx908.with_debug(DebugFlags {
            non_xdlops_inline_asm_disabled: true,
            ..DebugFlags::default()
        });
        assert!(!overridden.use_inline_asm(DataType::F32));
    }
}

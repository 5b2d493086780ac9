//! Simulator configuration.

/// Run configuration, fixed at startup.
///
/// One copy of this record is built before any context exists and is
/// cloned into each context. Nothing here is mutated after init; mode
/// changes require a reset.
///
/// Endianness is a compile-time choice (`big-endian` cargo feature on the
/// memory crate), not a field here, because the sub-word aliasing of the
/// segment storage depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// Simulate the one-instruction branch delay slot of real MIPS.
    pub delayed_branches: bool,
    /// Loads land in their destination two cycles later, as on the R2000.
    pub delayed_loads: bool,
    /// Bare machine: no default exception handler image is installed.
    pub bare_machine: bool,
    /// Accept pseudo-instructions in source (consumed by the external
    /// assembler; carried here so one record describes the whole run).
    pub accept_pseudo_insts: bool,
    /// Initial user text segment size in bytes.
    pub text_size: u32,
    /// Initial user data segment size in bytes.
    pub data_size: u32,
    /// Hard ceiling on user data growth in bytes.
    pub data_limit: u32,
    /// Initial stack segment size in bytes.
    pub stack_size: u32,
    /// Hard ceiling on stack growth in bytes.
    pub stack_limit: u32,
    /// Initial kernel text segment size in bytes.
    pub k_text_size: u32,
    /// Initial kernel data segment size in bytes.
    pub k_data_size: u32,
    /// Hard ceiling on kernel data growth in bytes.
    pub k_data_limit: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            delayed_branches: false,
            delayed_loads: false,
            bare_machine: false,
            accept_pseudo_insts: true,
            text_size: 0x10000,
            data_size: 0x20000,
            data_limit: 0x0400_0000,
            stack_size: 0x20000,
            stack_limit: 0x0400_0000,
            k_text_size: 0x10000,
            k_data_size: 0x10000,
            k_data_limit: 0x0400_0000,
        }
    }
}

//! Bit-flag types, modelled on `tskit`'s `bitflags` usage (e.g.
//! `IndividualFlags`).

bitflags::bitflags! {
    /// Per-node flags. The only flag meaningful to this crate is
    /// `IS_PC_ANCESTOR`, marking a node synthesised by path compression
    /// during path compression.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u32 {
        /// Set on nodes synthesised by [`crate::tree_sequence_builder::TreeSequenceBuilder`]'s
        /// path compression.
        const IS_PC_ANCESTOR = 1 << 0;
    }
}

bitflags::bitflags! {
    /// Constructor/operation flags for
    /// [`crate::tree_sequence_builder::TreeSequenceBuilder`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BuilderFlags: u32 {
        /// Run path compression after installing a path.
        const COMPRESS_PATH = 1 << 0;
        /// Run the full internal-consistency check after every `add_path`.
        const EXTENDED_CHECKS = 1 << 1;
    }
}

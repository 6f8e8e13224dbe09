use thiserror::Error;

use crate::{emit::Label, metadata::token::Token};

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all possible error conditions that can occur during bytecode emission,
/// label resolution, exception-region tracking, baking, and type construction. Each variant
/// provides specific context about the failure mode to enable appropriate error handling.
///
/// # Error Categories
///
/// ## Structural Errors
/// Violations of the emission state machine. These are always fatal to the current builder,
/// which must be discarded; nothing is retried or auto-repaired.
/// - [`Error::UnresolvedLabel`] - A branch referenced a label that was never marked
/// - [`Error::LabelRedefined`] - A label was marked twice
/// - [`Error::ForeignLabel`] - A label from a different instruction stream was used
/// - [`Error::UnclosedRegion`] - Exception regions were still open at bake
/// - [`Error::NotInProtectedRegion`] - A handler operation ran with no open region
/// - [`Error::RegionOverlap`] - Two exception regions partially overlap
/// - [`Error::RegionNoHandler`] - A protected region was closed without any handler
/// - [`Error::AlreadyBaked`] - A method body was baked twice
/// - [`Error::BodyStreamOpen`] - A body stream was issued but never handed back
/// - [`Error::AlreadyCreated`] - A builder was mutated after finalization
/// - [`Error::AlreadyCommitted`] - A container was committed twice
///
/// ## Encoding-Range Errors
/// The chosen encoding cannot represent the resolved value. Encodings are committed at
/// emission time and never upgraded afterwards, trading a hard failure for predictable
/// emission semantics.
/// - [`Error::ShortBranchOutOfRange`] - A one-byte branch operand resolved outside `[-128, 127]`
/// - [`Error::TokenOverflow`] - A metadata table ran out of row space
///
/// ## Argument Errors
/// Raised immediately at the offending call, never deferred to bake.
/// - [`Error::EmptyEntity`] - An empty name or blob was interned
/// - [`Error::ForeignContainer`] - A handle from a different container was used
/// - [`Error::UnknownHandle`] - A handle does not refer to a live builder
/// - [`Error::DuplicateTypeName`] - A type name was defined twice in one container
/// - [`Error::WrongOperand`] - An instruction was emitted with the wrong operand form
/// - [`Error::CatchTypeMissing`] - A catch clause was opened without an exception type
/// - [`Error::CatchTypeForbidden`] - A filter's catch named an exception type
/// - [`Error::InvalidSignature`] - A signature blob could not be encoded
/// - [`Error::StillPending`] - A pending token was resolved before its builder was created
/// - [`Error::UnmatchedAssembler`] - An assembler was handed back to the wrong method
///
/// # Examples
///
/// ```rust
/// use cilforge::{opcodes, Error, IlAssembler};
///
/// let mut asm = IlAssembler::new();
/// let target = asm.define_label();
/// asm.emit_branch(&opcodes::BR_S, target)?;
///
/// match asm.bake() {
///     Err(Error::UnresolvedLabel(label)) => {
///         eprintln!("dangling branch to {}", label);
///     }
///     Err(other) => return Err(other),
///     Ok(_) => {}
/// }
/// # Ok::<(), cilforge::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Structural errors
    /// A branch targeted a label that was never marked.
    ///
    /// Every fixup recorded during emission must have its label marked before bake;
    /// this error identifies the first dangling label found by the patch pass.
    #[error("Branch target {0} was never marked")]
    UnresolvedLabel(Label),

    /// A label was marked a second time.
    ///
    /// Each label resolves to exactly one stream position. Marking it again would
    /// silently move every branch that already referenced it.
    #[error("{0} has already been marked")]
    LabelRedefined(Label),

    /// A label belonging to a different instruction stream was used.
    ///
    /// Labels are owned by the assembler that defined them; positions recorded in
    /// one stream are meaningless in another.
    #[error("{0} belongs to a different instruction stream")]
    ForeignLabel(Label),

    /// One or more exception regions were still open when bake was invoked.
    ///
    /// Nothing is auto-closed; the count tells the caller how many
    /// `end_protected_region` calls are missing.
    #[error("{0} exception region(s) left open at bake")]
    UnclosedRegion(usize),

    /// A handler or close operation ran while no protected region was open.
    #[error("No protected region is open")]
    NotInProtectedRegion,

    /// Two exception regions partially overlap.
    ///
    /// Try ranges must be fully nested or fully disjoint. The offsets identify the
    /// try-range starts of the offending pair.
    #[error("Exception regions starting at 0x{first:x} and 0x{second:x} partially overlap")]
    RegionOverlap {
        /// Try-range start offset of the first region of the offending pair
        first: u32,
        /// Try-range start offset of the second region of the offending pair
        second: u32,
    },

    /// A protected region was closed straight from its try or filter block.
    ///
    /// Every region needs at least one completed handler clause before
    /// `end_protected_region`.
    #[error("Protected region closed without a handler clause")]
    RegionNoHandler,

    /// A filter block was abandoned instead of transitioning to its catch
    /// handler.
    ///
    /// After [`crate::emit::IlAssembler::begin_filter`] the only legal
    /// continuation is [`crate::emit::IlAssembler::begin_catch`] with no
    /// exception type.
    #[error("Filter block must be followed by its catch handler")]
    FilterNeedsCatch,

    /// The method body was already baked.
    ///
    /// Baking is a one-shot commit; the first bake froze the body.
    #[error("Method body has already been baked")]
    AlreadyBaked,

    /// A body stream was issued for the method but never handed back for baking.
    ///
    /// The associated value is the name of the offending method.
    #[error("Method '{0}' has an open body stream that was never baked")]
    BodyStreamOpen(String),

    /// A builder was mutated after it reached the created state.
    ///
    /// The associated value names the finalized entity.
    #[error("'{0}' has already been created")]
    AlreadyCreated(String),

    /// The container was already committed to a sink.
    #[error("Container has already been committed")]
    AlreadyCommitted,

    // Encoding-range errors
    /// A short-form branch operand resolved outside the signed-byte range.
    ///
    /// The one-byte width was committed when the instruction was emitted and is
    /// never widened retroactively. Recovery is the caller's: re-emit using the
    /// long form.
    #[error("Short-form branch at 0x{position:x} cannot encode offset {offset}")]
    ShortBranchOutOfRange {
        /// Stream offset of the one-byte operand
        position: u32,
        /// The relative offset that did not fit
        offset: i32,
    },

    /// A metadata table ran out of row space.
    ///
    /// Rows are 23-bit in this engine; the associated value is the table tag whose
    /// space was exhausted.
    #[error("Token row space exhausted for table 0x{0:02x}")]
    TokenOverflow(u8),

    // Argument errors
    /// An empty name or empty blob was passed where an entity was required.
    ///
    /// The associated value names the kind of entity that was absent.
    #[error("Cannot intern an empty {0}")]
    EmptyEntity(&'static str),

    /// A builder handle belonging to a different container was used.
    #[error("Handle belongs to a different container")]
    ForeignContainer,

    /// A handle does not refer to a live builder in this container.
    #[error("Handle does not refer to a live builder")]
    UnknownHandle,

    /// A type with the same name is already defined in this container.
    #[error("Type '{0}' is already defined in this container")]
    DuplicateTypeName(String),

    /// An instruction was emitted through the wrong operand surface.
    ///
    /// Each emit entry point checks the opcode's operand form; `brtrue` cannot be
    /// emitted without a label, `ldc.i4` cannot carry a token, and so on.
    #[error("Instruction '{mnemonic}' expects {expected}")]
    WrongOperand {
        /// Mnemonic of the rejected instruction
        mnemonic: &'static str,
        /// Description of the operand form the instruction requires
        expected: &'static str,
    },

    /// A catch clause was opened without an exception type.
    #[error("Catch clause requires an exception type token")]
    CatchTypeMissing,

    /// The catch completing a filter named an exception type.
    ///
    /// A filter supplies its own match; its catch block must not carry one.
    #[error("Catch following a filter must not name an exception type")]
    CatchTypeForbidden,

    /// A signature could not be encoded.
    ///
    /// Raised when a signature blob is constructed from elements the binary
    /// format cannot express, such as a coded index over the wrong table.
    #[error("Invalid signature - {0}")]
    InvalidSignature(String),

    /// A pending token was resolved before its builder was created.
    #[error("Token {0} is still pending; its builder has not been created")]
    StillPending(Token),

    /// An assembler was handed back for a method it was not issued for.
    #[error("Assembler does not belong to this method")]
    UnmatchedAssembler,

    // Infrastructure
    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically when a
    /// container lock was poisoned by a panicking thread.
    #[error("Failed to lock target")]
    LockError,

    /// An out of bound access was attempted while patching the stream.
    ///
    /// Patch offsets must lie entirely within the bytes already emitted.
    #[error("Out of Bound write would have occurred!")]
    OutOfBounds,

    /// Generic error for miscellaneous failures.
    ///
    /// Used by external collaborators (such as body sinks) that need to surface
    /// failures through this crate's error type.
    #[error("{0}")]
    Error(String),
}

//! Defines [`Program`], the structured description of a compiled program the VM is constructed
//! from, plus the debug-info types used to format diagnostics.

use indexmap::IndexMap;
use starknet_types_core::felt::Felt;

use crate::hint::HintReference;
use crate::memory::Value;

/// One hint attached to a program counter offset, as declared by the compiler.
///
/// `tag` identifies which concrete [`Hint`](crate::hint::Hint) implementation this hint maps to
/// in the tagged-variant registry (see [`crate::hint::code`]); `accessible_scopes` and
/// `flow_tracking_data` are carried through for diagnostics but the core itself does not
/// interpret them beyond that.
#[derive(Debug, Clone)]
pub struct HintSpec {
    /// The tag identifying which registered [`Hint`](crate::hint::Hint) to build.
    pub tag: String,
    /// The names of the scopes visible to this hint, outermost first.
    pub accessible_scopes: Vec<String>,
    /// Opaque flow-tracking metadata, carried through unparsed.
    pub flow_tracking_data: IndexMap<String, String>,
}

impl HintSpec {
    /// Creates a new hint declaration with no accessible scopes or flow-tracking data.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            accessible_scopes: Vec::new(),
            flow_tracking_data: IndexMap::new(),
        }
    }
}

/// A source location associated with a single program counter offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionLocation {
    /// The name of the file this instruction originated from, as recorded in
    /// [`DebugInfo::file_contents`].
    pub file: String,
    /// The 1-based line number within `file`.
    pub line: u32,
    /// The 1-based column number within `file`.
    pub column: u32,
}

impl std::fmt::Display for InstructionLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Optional debug metadata attached to a [`Program`], used only to format tracebacks and other
/// diagnostics; never consulted by the interpreter itself.
#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    /// Maps a file name to its full contents, so a diagnostic can quote the offending line.
    pub file_contents: IndexMap<String, String>,
    /// Maps a program counter offset (relative to the program segment) to its source location.
    pub instruction_locations: IndexMap<usize, InstructionLocation>,
}

/// An entry of the program's symbol table.
///
/// This only captures what the VM core itself consults (struct member offsets, used to resolve
/// `ids` accesses); richer identifier kinds (functions, labels, consts) are carried as an opaque
/// `full_name` for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Identifier {
    /// The fully-qualified name of this identifier, e.g. `__main__.fibonacci.Args`.
    pub full_name: String,
    /// For struct-like identifiers, the offset of each named member within the struct.
    pub members: IndexMap<String, usize>,
}

/// A structured description of a compiled program, as handed to [`CairoVM::new`](crate::CairoVM::new).
///
/// This is the crate's only input format; compiling source into this shape is out of scope.
#[derive(Debug, Clone)]
pub struct Program {
    /// The prime of the field this program was compiled against. The VM refuses to load a
    /// program whose prime does not match its own.
    pub prime: Felt,
    /// The raw contents of the program segment, placed at successive offsets starting at 0.
    pub data: Vec<Value>,
    /// Maps a program-segment offset to the ordered list of hints declared at that offset.
    pub hints: IndexMap<usize, Vec<HintSpec>>,
    /// The program's symbol table.
    pub identifiers: IndexMap<String, Identifier>,
    /// The references available to resolve `ids.name` accesses from hints, keyed by name.
    pub reference_manager: IndexMap<String, HintReference>,
    /// Optional debug metadata.
    pub debug_info: Option<DebugInfo>,
}

impl Program {
    /// Returns the source location associated with a program-segment offset, if debug info was
    /// loaded for this program.
    pub fn location_for(&self, offset: usize) -> Option<&InstructionLocation> {
        self.debug_info
            .as_ref()?
            .instruction_locations
            .get(&offset)
    }
}

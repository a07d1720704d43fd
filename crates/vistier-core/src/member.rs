//! Member identity: declaring class, name, descriptor, kind, and declared
//! access modifier.
//!
//! A [`Member`] is immutable once its declaring class has been defined. The
//! textual signature form used by flag files, exemption prefixes, and denial
//! logs is:
//!
//! ```text
//! Lcom/foo/Bar;->field:I          (field)
//! Lcom/foo/Bar;->method(II)V      (method)
//! Lcom/foo/Bar;-><init>()V        (constructor)
//! ```
//!
//! [`parse_signature`] is total over arbitrary input: it never panics and
//! enforces explicit length bounds. It is exercised by the fuzz harness.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Bounds
// =============================================================================

/// Maximum length of a class descriptor (`Lcom/foo/Bar;`).
pub const MAX_CLASS_DESCRIPTOR_LENGTH: usize = 512;

/// Maximum length of a member simple name.
pub const MAX_MEMBER_NAME_LENGTH: usize = 256;

/// Maximum length of a member type descriptor (field type or method shape).
pub const MAX_MEMBER_DESCRIPTOR_LENGTH: usize = 512;

/// Maximum length of an artifact path.
pub const MAX_ARTIFACT_PATH_LENGTH: usize = 4096;

/// Constructor name in textual signatures.
pub const CONSTRUCTOR_NAME: &str = "<init>";

// =============================================================================
// Errors
// =============================================================================

/// Failure to parse or validate a member signature or class descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The input was empty.
    #[error("empty signature")]
    Empty,

    /// The input exceeded a length bound.
    #[error("signature component too long: {component} is {len} bytes (max {max})")]
    TooLong {
        /// Which component violated the bound.
        component: &'static str,
        /// Observed length in bytes.
        len: usize,
        /// The bound that was violated.
        max: usize,
    },

    /// The `->` member separator was missing.
    #[error("missing '->' separator in {0:?}")]
    MissingSeparator(String),

    /// The class descriptor was not of the form `Lname;`.
    #[error("malformed class descriptor {0:?}")]
    BadClassDescriptor(String),

    /// The member name was empty or contained forbidden characters.
    #[error("malformed member name {0:?}")]
    BadMemberName(String),

    /// The field type or method shape descriptor was malformed.
    #[error("malformed type descriptor {0:?}")]
    BadTypeDescriptor(String),
}

// =============================================================================
// ClassId
// =============================================================================

/// Identity of a loaded class: binary descriptor plus defining artifact.
///
/// Two loads of the same descriptor from different artifacts are distinct
/// identities. A redefinition therefore never mutates an existing tier table
/// entry; it introduces a new class identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassId {
    descriptor: String,
    artifact: String,
}

impl ClassId {
    /// Construct a validated class identity.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] if the descriptor is not of the form
    /// `Lcom/foo/Bar;` or either component exceeds its length bound.
    pub fn new(
        descriptor: impl Into<String>,
        artifact: impl Into<String>,
    ) -> Result<Self, SignatureError> {
        let descriptor = descriptor.into();
        let artifact = artifact.into();
        validate_class_descriptor(&descriptor)?;
        if artifact.len() > MAX_ARTIFACT_PATH_LENGTH {
            return Err(SignatureError::TooLong {
                component: "artifact path",
                len: artifact.len(),
                max: MAX_ARTIFACT_PATH_LENGTH,
            });
        }
        Ok(Self {
            descriptor,
            artifact,
        })
    }

    /// The binary class descriptor, e.g. `Lcom/foo/Bar;`.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Path of the artifact this class was defined from.
    #[must_use]
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// Slash-separated package prefix of the descriptor, without the leading
    /// `L`. Empty for classes in the default package.
    #[must_use]
    pub fn package(&self) -> &str {
        let interior = &self.descriptor[1..self.descriptor.len() - 1];
        match interior.rfind('/') {
            Some(idx) => &interior[..idx],
            None => "",
        }
    }

    /// Whether `other` names the same class descriptor, regardless of the
    /// defining artifact.
    #[must_use]
    pub fn same_descriptor(&self, other: &ClassId) -> bool {
        self.descriptor == other.descriptor
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor)
    }
}

// =============================================================================
// MemberKind / AccessModifier
// =============================================================================

/// Kind of class member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// An instance or static field.
    Field,
    /// An instance, static, or interface method.
    Method,
    /// A constructor (`<init>` in textual signatures).
    Constructor,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field => write!(f, "field"),
            Self::Method => write!(f, "method"),
            Self::Constructor => write!(f, "constructor"),
        }
    }
}

/// Declared access modifier of a member.
///
/// Modifier enforcement is a separate gate from tier enforcement: a tier can
/// forbid an access that plain visibility would allow, never the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessModifier {
    /// Visible everywhere.
    Public,
    /// Visible within the same runtime package.
    PackagePrivate,
    /// Visible within the same package and to subclasses.
    Protected,
    /// Visible only within the declaring class.
    Private,
}

impl fmt::Display for AccessModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::PackagePrivate => write!(f, "package-private"),
            Self::Protected => write!(f, "protected"),
            Self::Private => write!(f, "private"),
        }
    }
}

// =============================================================================
// Member
// =============================================================================

/// A field, method, or constructor of a loaded class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    declaring: ClassId,
    name: String,
    descriptor: String,
    kind: MemberKind,
    modifier: AccessModifier,
}

impl Member {
    /// Construct a validated member.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] if the name or descriptor is malformed for
    /// the given kind, or a length bound is exceeded. Constructors must be
    /// named `<init>` and have a `V` return.
    pub fn new(
        declaring: ClassId,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        kind: MemberKind,
        modifier: AccessModifier,
    ) -> Result<Self, SignatureError> {
        let name = name.into();
        let descriptor = descriptor.into();
        validate_member_name(&name, kind)?;
        match kind {
            MemberKind::Field => validate_field_descriptor(&descriptor)?,
            MemberKind::Method | MemberKind::Constructor => {
                validate_method_descriptor(&descriptor)?;
                if kind == MemberKind::Constructor && !descriptor.ends_with('V') {
                    return Err(SignatureError::BadTypeDescriptor(descriptor));
                }
            },
        }
        Ok(Self {
            declaring,
            name,
            descriptor,
            kind,
            modifier,
        })
    }

    /// The declaring class identity.
    #[must_use]
    pub fn declaring(&self) -> &ClassId {
        &self.declaring
    }

    /// Simple name; `<init>` for constructors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field type descriptor or `(params)ret` method shape.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Member kind.
    #[must_use]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Declared access modifier.
    #[must_use]
    pub fn modifier(&self) -> AccessModifier {
        self.modifier
    }

    /// Lookup key within the declaring class: name, descriptor, kind.
    #[must_use]
    pub fn key(&self) -> MemberKey {
        MemberKey {
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
            kind: self.kind,
        }
    }

    /// Textual signature form, e.g. `Lcom/foo/Bar;->method(II)V`.
    #[must_use]
    pub fn signature(&self) -> String {
        match self.kind {
            MemberKind::Field => {
                format!("{}->{}:{}", self.declaring.descriptor(), self.name, self.descriptor)
            },
            MemberKind::Method | MemberKind::Constructor => {
                format!("{}->{}{}", self.declaring.descriptor(), self.name, self.descriptor)
            },
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// Hash key for a member within its declaring class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    /// Simple name.
    pub name: String,
    /// Field type descriptor or method shape.
    pub descriptor: String,
    /// Member kind.
    pub kind: MemberKind,
}

impl MemberKey {
    /// Construct a key without validation. Intended for lookups where the
    /// components were already validated at definition time.
    #[must_use]
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            kind,
        }
    }
}

// =============================================================================
// Parsed signatures
// =============================================================================

/// A parsed textual member signature, not yet bound to a defining artifact
/// or access modifier. Flag files and the CLI operate on this form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberSignature {
    /// Class descriptor of the declaring class.
    pub class_descriptor: String,
    /// Simple name; `<init>` for constructors.
    pub name: String,
    /// Field type descriptor or method shape.
    pub descriptor: String,
    /// Member kind inferred from the signature shape.
    pub kind: MemberKind,
}

impl fmt::Display for MemberSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MemberKind::Field => {
                write!(f, "{}->{}:{}", self.class_descriptor, self.name, self.descriptor)
            },
            MemberKind::Method | MemberKind::Constructor => {
                write!(f, "{}->{}{}", self.class_descriptor, self.name, self.descriptor)
            },
        }
    }
}

/// Parse the textual signature form.
///
/// Fields use `Lcls;->name:type`, methods and constructors use
/// `Lcls;->name(params)ret`. The kind is inferred from the shape; a method
/// named `<init>` parses as a constructor.
///
/// # Errors
///
/// Returns [`SignatureError`] for any input that does not round-trip through
/// [`MemberSignature`]'s `Display` form.
pub fn parse_signature(input: &str) -> Result<MemberSignature, SignatureError> {
    if input.is_empty() {
        return Err(SignatureError::Empty);
    }
    if input.len() > MAX_CLASS_DESCRIPTOR_LENGTH + MAX_MEMBER_NAME_LENGTH + MAX_MEMBER_DESCRIPTOR_LENGTH {
        return Err(SignatureError::TooLong {
            component: "signature",
            len: input.len(),
            max: MAX_CLASS_DESCRIPTOR_LENGTH + MAX_MEMBER_NAME_LENGTH + MAX_MEMBER_DESCRIPTOR_LENGTH,
        });
    }
    let (class_descriptor, rest) = input
        .split_once("->")
        .ok_or_else(|| SignatureError::MissingSeparator(bounded(input)))?;
    validate_class_descriptor(class_descriptor)?;

    // Method shape: name followed by '(params)ret'. Field shape: 'name:type'.
    // '(' is checked first so field types containing ':' never ambiguate.
    if let Some(paren) = rest.find('(') {
        let name = &rest[..paren];
        let descriptor = &rest[paren..];
        let kind = if name == CONSTRUCTOR_NAME {
            MemberKind::Constructor
        } else {
            MemberKind::Method
        };
        validate_member_name(name, kind)?;
        validate_method_descriptor(descriptor)?;
        if kind == MemberKind::Constructor && !descriptor.ends_with('V') {
            return Err(SignatureError::BadTypeDescriptor(bounded(descriptor)));
        }
        return Ok(MemberSignature {
            class_descriptor: class_descriptor.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            kind,
        });
    }

    let (name, descriptor) = rest
        .split_once(':')
        .ok_or_else(|| SignatureError::MissingSeparator(bounded(rest)))?;
    validate_member_name(name, MemberKind::Field)?;
    validate_field_descriptor(descriptor)?;
    Ok(MemberSignature {
        class_descriptor: class_descriptor.to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        kind: MemberKind::Field,
    })
}

/// Truncate an arbitrary input for inclusion in an error value.
fn bounded(input: &str) -> String {
    const ERR_SNIPPET: usize = 64;
    if input.len() <= ERR_SNIPPET {
        input.to_string()
    } else {
        let mut end = ERR_SNIPPET;
        while !input.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &input[..end])
    }
}

// =============================================================================
// Descriptor validation
// =============================================================================

fn validate_class_descriptor(descriptor: &str) -> Result<(), SignatureError> {
    if descriptor.len() > MAX_CLASS_DESCRIPTOR_LENGTH {
        return Err(SignatureError::TooLong {
            component: "class descriptor",
            len: descriptor.len(),
            max: MAX_CLASS_DESCRIPTOR_LENGTH,
        });
    }
    let interior = descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .ok_or_else(|| SignatureError::BadClassDescriptor(bounded(descriptor)))?;
    if interior.is_empty()
        || interior.split('/').any(|segment| {
            segment.is_empty()
                || segment
                    .chars()
                    .any(|c| matches!(c, '.' | ';' | '[' | '(' | ')') || c.is_whitespace())
        })
    {
        return Err(SignatureError::BadClassDescriptor(bounded(descriptor)));
    }
    Ok(())
}

fn validate_member_name(name: &str, kind: MemberKind) -> Result<(), SignatureError> {
    if name.len() > MAX_MEMBER_NAME_LENGTH {
        return Err(SignatureError::TooLong {
            component: "member name",
            len: name.len(),
            max: MAX_MEMBER_NAME_LENGTH,
        });
    }
    if kind == MemberKind::Constructor {
        if name != CONSTRUCTOR_NAME {
            return Err(SignatureError::BadMemberName(bounded(name)));
        }
        return Ok(());
    }
    if name.is_empty()
        || name
            .chars()
            .any(|c| matches!(c, '.' | ';' | '[' | '/' | '(' | ')' | '<' | '>') || c.is_whitespace())
    {
        return Err(SignatureError::BadMemberName(bounded(name)));
    }
    Ok(())
}

/// Consume one field type descriptor from `chars`, returning the remainder.
fn eat_type(input: &str) -> Result<&str, ()> {
    let mut rest = input;
    // Array dimensions.
    while let Some(stripped) = rest.strip_prefix('[') {
        rest = stripped;
    }
    match rest.chars().next() {
        Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => Ok(&rest[1..]),
        Some('L') => {
            let end = rest.find(';').ok_or(())?;
            if end == 1 {
                return Err(());
            }
            Ok(&rest[end + 1..])
        },
        _ => Err(()),
    }
}

fn validate_field_descriptor(descriptor: &str) -> Result<(), SignatureError> {
    if descriptor.len() > MAX_MEMBER_DESCRIPTOR_LENGTH {
        return Err(SignatureError::TooLong {
            component: "type descriptor",
            len: descriptor.len(),
            max: MAX_MEMBER_DESCRIPTOR_LENGTH,
        });
    }
    match eat_type(descriptor) {
        Ok("") => Ok(()),
        _ => Err(SignatureError::BadTypeDescriptor(bounded(descriptor))),
    }
}

fn validate_method_descriptor(descriptor: &str) -> Result<(), SignatureError> {
    if descriptor.len() > MAX_MEMBER_DESCRIPTOR_LENGTH {
        return Err(SignatureError::TooLong {
            component: "method descriptor",
            len: descriptor.len(),
            max: MAX_MEMBER_DESCRIPTOR_LENGTH,
        });
    }
    let bad = || SignatureError::BadTypeDescriptor(bounded(descriptor));
    let mut rest = descriptor.strip_prefix('(').ok_or_else(bad)?;
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            // Return type: V or one field type, consuming everything.
            if after == "V" {
                return Ok(());
            }
            return match eat_type(after) {
                Ok("") => Ok(()),
                _ => Err(bad()),
            };
        }
        rest = eat_type(rest).map_err(|()| bad())?;
        if rest.is_empty() {
            // Ran out of input before the closing paren.
            return Err(bad());
        }
    }
}

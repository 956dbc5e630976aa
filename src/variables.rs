use clap::ValueEnum;

/// A placeholder variable usable in statement templates.
///
/// The registry is closed: templates may only reference these names, spelled
/// exactly as [`Variable::name`] returns them. Ids start at 1 so the whole
/// registry fits a single `u32` bitmask with bit 0 left unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
#[repr(u8)]
pub enum Variable {
    /// Domain name being looked up or recorded.
    Domain = 1,
    /// Comma-joined authentication evidence (`author,spf,dkim,...`).
    AuthType,
    /// Reference returned by a domain select/insert, fed back into later
    /// statements.
    DomainRef,
    /// Reference returned by a message insert.
    MessageRef,
    /// Inode component of the local message identifier.
    Ino,
    /// Modification-time component of the local message identifier.
    Mtime,
    /// Process-id component of the local message identifier.
    Pid,
    /// Canonical textual key for the client address.
    Ip,
    /// Message date header.
    Date,
    /// Message-ID header.
    MessageId,
    /// Content-Type header.
    ContentType,
    /// Content-Transfer-Encoding header.
    ContentEncoding,
    /// Number of Received headers.
    ReceivedCount,
    /// Number of verified signatures.
    SignaturesCount,
    /// Whether the message came through a mailing list.
    MailingList,
}

// The whole registry, including the unused id 0, must fit a u32 bitmask.
const _: () = assert!((Variable::MailingList as u32) < 32);

/// Array length for per-variable tables indexed by id (id 0 unused).
pub(crate) const VAR_SLOTS: usize = Variable::MailingList as usize + 1;

impl Variable {
    /// Every registry entry, in ascending id order.
    pub const ALL: [Variable; 15] = [
        Variable::Domain,
        Variable::AuthType,
        Variable::DomainRef,
        Variable::MessageRef,
        Variable::Ino,
        Variable::Mtime,
        Variable::Pid,
        Variable::Ip,
        Variable::Date,
        Variable::MessageId,
        Variable::ContentType,
        Variable::ContentEncoding,
        Variable::ReceivedCount,
        Variable::SignaturesCount,
        Variable::MailingList,
    ];

    /// The canonical template spelling of this variable.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Variable::Domain => "domain",
            Variable::AuthType => "auth_type",
            Variable::DomainRef => "domain_ref",
            Variable::MessageRef => "message_ref",
            Variable::Ino => "ino",
            Variable::Mtime => "mtime",
            Variable::Pid => "pid",
            Variable::Ip => "ip",
            Variable::Date => "date",
            Variable::MessageId => "message_id",
            Variable::ContentType => "content_type",
            Variable::ContentEncoding => "content_encoding",
            Variable::ReceivedCount => "received_count",
            Variable::SignaturesCount => "signatures_count",
            Variable::MailingList => "mailing_list",
        }
    }

    /// Look a template identifier up in the registry.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Variable> {
        Variable::ALL.into_iter().find(|var| var.name() == name)
    }
}

/// A set of registry variables, packed into a `u32` bitmask.
///
/// Used both for per-statement allow-sets and for per-call requested-id sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarSet(u32);

impl VarSet {
    pub const EMPTY: VarSet = VarSet(0);

    #[must_use]
    pub const fn of(vars: &[Variable]) -> VarSet {
        let mut bits = 0u32;
        let mut i = 0;
        while i < vars.len() {
            bits |= 1u32 << (vars[i] as u32);
            i += 1;
        }
        VarSet(bits)
    }

    #[must_use]
    pub const fn with(self, var: Variable) -> VarSet {
        VarSet(self.0 | 1u32 << (var as u32))
    }

    #[must_use]
    pub const fn union(self, other: VarSet) -> VarSet {
        VarSet(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, var: Variable) -> bool {
        self.0 & (1u32 << (var as u32)) != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, var: Variable) {
        self.0 |= 1u32 << (var as u32);
    }

    pub fn remove(&mut self, var: Variable) {
        self.0 &= !(1u32 << (var as u32));
    }

    /// Members in ascending id order.
    pub fn iter(self) -> impl Iterator<Item = Variable> {
        Variable::ALL.into_iter().filter(move |var| self.contains(*var))
    }
}

/// Per-call variable values.
///
/// A binding set is constructed for one logical operation and dropped at its
/// end; nothing is shared between unrelated calls. A bound but empty value
/// renders as empty text, exactly like an unrequested variable.
#[derive(Debug)]
pub struct VarBindings {
    values: [Option<String>; VAR_SLOTS],
}

impl VarBindings {
    #[must_use]
    pub fn new() -> VarBindings {
        VarBindings {
            values: std::array::from_fn(|_| None),
        }
    }

    pub fn set(&mut self, var: Variable, value: impl Into<String>) {
        self.values[var as usize] = Some(value.into());
    }

    #[must_use]
    pub fn get(&self, var: Variable) -> Option<&str> {
        self.values[var as usize].as_deref()
    }

    #[must_use]
    pub fn is_bound(&self, var: Variable) -> bool {
        self.values[var as usize].is_some()
    }
}

impl Default for VarBindings {
    fn default() -> Self {
        VarBindings::new()
    }
}

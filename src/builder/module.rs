//! The construction container sequencing define, create, and commit.
//!
//! [`ModuleBuilder`] owns every builder transitively: type, method, field,
//! and generic-parameter records live in its pending lists and are addressed
//! through opaque handles. Definition reserves a provisional identity so
//! entities may reference each other before either is finalized; creation
//! resolves those references, assigns final tokens in creation order, and
//! publishes immutable snapshots to lock-free registries; commit patches
//! every baked body's pending-token relocations and streams the encoded
//! bodies to a [`BodySink`].

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, RwLock,
    },
};

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use uguid::Guid;

use crate::{
    builder::{
        fields::{FieldAttributes, FieldHandle, FieldInfo, PendingField},
        generics::{
            GenericParamAttributes, GenericParamHandle, GenericParamInfo, PendingGenericParam,
        },
        interner::TokenInterner,
        methods::{MethodAttributes, MethodHandle, MethodInfo, PendingMethod, StreamState},
        types::{PendingType, TypeAttributes, TypeHandle, TypeInfo},
    },
    emit::{IlAssembler, MethodBody},
    metadata::{tables::TableId, token::Token},
    Error, Result,
};

/// Source of unique container ids, used to reject handles that cross
/// container boundaries.
static CONTAINER_IDS: AtomicU32 = AtomicU32::new(1);

/// Derives a process-unique module version id from the container identity.
fn fresh_mvid(name: &str, container: u32) -> Guid {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    container.hash(&mut hasher);
    let low = hasher.finish();
    low.hash(&mut hasher);
    let high = hasher.finish();

    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&low.to_le_bytes());
    bytes[8..].copy_from_slice(&high.to_le_bytes());
    // shape the version and variant fields like a generated GUID
    bytes[7] = (bytes[7] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    Guid::from_bytes(bytes)
}

/// Mutable container state, serialized under the container lock.
struct ModuleState {
    types: Vec<PendingType>,
    methods: Vec<PendingMethod>,
    fields: Vec<PendingField>,
    generics: Vec<PendingGenericParam>,
    interner: TokenInterner,
    committed: bool,
}

/// Maps a pending token to its final token once its builder was created.
/// Final tokens map to themselves.
fn resolve_pending(state: &ModuleState, token: Token) -> Result<Token> {
    if !token.is_pending() {
        return Ok(token);
    }
    let index = token.pending_index() as usize;
    let created = match TableId::from_tag(token.table()) {
        Some(TableId::TypeDef) => state.types.get(index).and_then(|record| record.created),
        Some(TableId::MethodDef) => state.methods.get(index).and_then(|record| record.created),
        Some(TableId::Field) => state.fields.get(index).and_then(|record| record.created),
        Some(TableId::GenericParam) => state.generics.get(index).and_then(|record| record.created),
        _ => None,
    };
    created.ok_or(Error::StillPending(token))
}

/// Byte-array persistence sink receiving finalized method bodies.
///
/// The construction engine stays agnostic of the surrounding object-file
/// machinery; whatever wants the encoded bodies implements this single
/// method. Closures with the matching signature implement it automatically:
///
/// ```rust
/// use cilforge::{builder::ModuleBuilder, Token};
///
/// let module = ModuleBuilder::new("empty");
/// let mut seen = 0;
/// module.commit(&mut |_method: Token, _body: &[u8]| {
///     seen += 1;
///     Ok(())
/// })?;
/// assert_eq!(seen, 0);
/// # Ok::<(), cilforge::Error>(())
/// ```
pub trait BodySink {
    /// Accepts the encoded body of `method`.
    ///
    /// # Errors
    ///
    /// An implementation error aborts the commit; the container stays
    /// uncommitted.
    fn accept(&mut self, method: Token, body: &[u8]) -> Result<()>;
}

impl<F> BodySink for F
where
    F: FnMut(Token, &[u8]) -> Result<()>,
{
    fn accept(&mut self, method: Token, body: &[u8]) -> Result<()> {
        self(method, body)
    }
}

/// A named container for dynamically constructed types and method bodies.
///
/// The builder lifecycle is *define* (reserve identity, get a handle),
/// *mutate* (members, attributes, body emission through [`IlAssembler`]),
/// *create* (freeze, assign final tokens), *commit* (patch relocations,
/// stream encoded bodies to a sink). Handles are only honored by the
/// container that issued them.
///
/// # Examples
///
/// ```rust
/// use cilforge::{
///     builder::{MethodAttributes, ModuleBuilder, TypeAttributes},
///     emit::opcodes,
///     metadata::signatures::{method_signature, MethodSig},
///     Token,
/// };
///
/// let module = ModuleBuilder::new("demo");
/// let object = module.type_ref("System", "Object")?;
/// let greeter = module.define_type("Greeter", TypeAttributes::PUBLIC, Some(object), &[])?;
///
/// let signature = method_signature(&MethodSig::default())?;
/// let greet = module.define_method(
///     &greeter,
///     "Greet",
///     MethodAttributes::PUBLIC | MethodAttributes::STATIC,
///     &signature,
/// )?;
///
/// let mut il = module.il_stream(&greet)?;
/// let hello = module.string_token("hello")?;
/// il.emit_token(&opcodes::LDSTR, hello)?;
/// il.emit(&opcodes::POP)?;
/// il.emit(&opcodes::RET)?;
/// module.bake(&greet, il)?;
///
/// let token = module.create_type(&greeter)?;
/// assert_eq!(token.value(), 0x0200_0001);
///
/// let mut bodies = Vec::new();
/// module.commit(&mut |method: Token, body: &[u8]| {
///     bodies.push((method, body.to_vec()));
///     Ok(())
/// })?;
/// assert_eq!(bodies.len(), 1);
/// # Ok::<(), cilforge::Error>(())
/// ```
pub struct ModuleBuilder {
    id: u32,
    name: String,
    mvid: Guid,
    state: RwLock<ModuleState>,
    created_types: SkipMap<Token, Arc<TypeInfo>>,
    created_methods: SkipMap<Token, Arc<MethodInfo>>,
    created_fields: SkipMap<Token, Arc<FieldInfo>>,
    created_generics: SkipMap<Token, Arc<GenericParamInfo>>,
    type_names: DashMap<String, Token>,
    next_type_row: AtomicU32,
    next_method_row: AtomicU32,
    next_field_row: AtomicU32,
    next_generic_row: AtomicU32,
}

impl ModuleBuilder {
    /// Creates an empty container with a fresh module version id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let id = CONTAINER_IDS.fetch_add(1, Ordering::Relaxed);
        let name = name.into();
        let mvid = fresh_mvid(&name, id);
        ModuleBuilder {
            id,
            name,
            mvid,
            state: RwLock::new(ModuleState {
                types: Vec::new(),
                methods: Vec::new(),
                fields: Vec::new(),
                generics: Vec::new(),
                interner: TokenInterner::new(),
                committed: false,
            }),
            created_types: SkipMap::new(),
            created_methods: SkipMap::new(),
            created_fields: SkipMap::new(),
            created_generics: SkipMap::new(),
            type_names: DashMap::new(),
            next_type_row: AtomicU32::new(1),
            next_method_row: AtomicU32::new(1),
            next_field_row: AtomicU32::new(1),
            next_generic_row: AtomicU32::new(1),
        }
    }

    /// Container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module version id of this container.
    #[must_use]
    pub fn mvid(&self) -> Guid {
        self.mvid
    }

    fn check_container(&self, container: u32) -> Result<()> {
        if container == self.id {
            Ok(())
        } else {
            Err(Error::ForeignContainer)
        }
    }

    /// Draws the next final row from `counter`.
    fn take_row(counter: &AtomicU32, table: TableId) -> Result<u32> {
        let row = counter.fetch_add(1, Ordering::Relaxed);
        if row > Token::MAX_ROW {
            return Err(Error::TokenOverflow(table as u8));
        }
        Ok(row)
    }

    // ── definition surface ──────────────────────────────────────────────

    /// Defines a new type and returns its handle.
    ///
    /// The type receives a provisional token immediately; `parent` and
    /// `interfaces` may be final tokens or pending tokens of types in this
    /// container, and are resolved at [`ModuleBuilder::create_type`] time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyEntity`] for an empty name,
    /// [`Error::DuplicateTypeName`] when the name is taken,
    /// [`Error::TokenOverflow`] when the pending row space is exhausted, and
    /// [`Error::AlreadyCommitted`] after commit.
    pub fn define_type(
        &self,
        name: impl Into<String>,
        attributes: TypeAttributes,
        parent: Option<Token>,
        interfaces: &[Token],
    ) -> Result<TypeHandle> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::EmptyEntity("type name"));
        }

        let mut state = write_lock!(self.state);
        if state.committed {
            return Err(Error::AlreadyCommitted);
        }
        if self.type_names.contains_key(&name) {
            return Err(Error::DuplicateTypeName(name));
        }
        if state.types.len() > Token::MAX_ROW as usize {
            return Err(Error::TokenOverflow(TableId::TypeDef as u8));
        }

        let token = Token::pending(TableId::TypeDef, state.types.len() as u32);
        state.types.push(PendingType {
            token,
            name: name.clone(),
            attributes,
            parent,
            interfaces: interfaces.to_vec(),
            generics: Arc::new(boxcar::Vec::new()),
            methods: Arc::new(boxcar::Vec::new()),
            fields: Arc::new(boxcar::Vec::new()),
            created: None,
        });
        self.type_names.insert(name, token);
        Ok(TypeHandle {
            container: self.id,
            token,
        })
    }

    /// Defines a method on a type that is still mutable.
    ///
    /// `signature` is an opaque blob, normally produced by
    /// [`crate::metadata::signatures::method_signature`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignContainer`] for a handle from another
    /// container, [`Error::AlreadyCreated`] when the declaring type was
    /// finalized, and [`Error::EmptyEntity`] for an empty name or blob.
    pub fn define_method(
        &self,
        declaring: &TypeHandle,
        name: impl Into<String>,
        attributes: MethodAttributes,
        signature: &[u8],
    ) -> Result<MethodHandle> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::EmptyEntity("method name"));
        }
        if signature.is_empty() {
            return Err(Error::EmptyEntity("method signature"));
        }
        self.check_container(declaring.container)?;

        let mut state = write_lock!(self.state);
        if state.committed {
            return Err(Error::AlreadyCommitted);
        }
        if state.methods.len() > Token::MAX_ROW as usize {
            return Err(Error::TokenOverflow(TableId::MethodDef as u8));
        }

        let token = Token::pending(TableId::MethodDef, state.methods.len() as u32);
        {
            let record = state
                .types
                .get(declaring.token.pending_index() as usize)
                .ok_or(Error::UnknownHandle)?;
            if record.created.is_some() {
                return Err(Error::AlreadyCreated(record.name.clone()));
            }
            record.methods.push(token);
        }
        state.methods.push(PendingMethod {
            token,
            name,
            attributes,
            signature: signature.to_vec(),
            stream: StreamState::NotIssued,
            created: None,
        });
        Ok(MethodHandle {
            container: self.id,
            token,
        })
    }

    /// Defines a field on a type that is still mutable.
    ///
    /// `signature` is an opaque blob, normally produced by
    /// [`crate::metadata::signatures::field_signature`].
    ///
    /// # Errors
    ///
    /// Same contract as [`ModuleBuilder::define_method`].
    pub fn define_field(
        &self,
        declaring: &TypeHandle,
        name: impl Into<String>,
        attributes: FieldAttributes,
        signature: &[u8],
    ) -> Result<FieldHandle> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::EmptyEntity("field name"));
        }
        if signature.is_empty() {
            return Err(Error::EmptyEntity("field signature"));
        }
        self.check_container(declaring.container)?;

        let mut state = write_lock!(self.state);
        if state.committed {
            return Err(Error::AlreadyCommitted);
        }
        if state.fields.len() > Token::MAX_ROW as usize {
            return Err(Error::TokenOverflow(TableId::Field as u8));
        }

        let token = Token::pending(TableId::Field, state.fields.len() as u32);
        {
            let record = state
                .types
                .get(declaring.token.pending_index() as usize)
                .ok_or(Error::UnknownHandle)?;
            if record.created.is_some() {
                return Err(Error::AlreadyCreated(record.name.clone()));
            }
            record.fields.push(token);
        }
        state.fields.push(PendingField {
            token,
            name,
            attributes,
            signature: signature.to_vec(),
            created: None,
        });
        Ok(FieldHandle {
            container: self.id,
            token,
        })
    }

    /// Defines generic parameters on a type that is still mutable, in
    /// declaration order.
    ///
    /// The parameters are created recursively when the owning type is
    /// created; until then constraints may be attached through
    /// [`ModuleBuilder::set_constraints`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyEntity`] if any name is empty, plus the handle
    /// contract of [`ModuleBuilder::define_method`].
    pub fn define_generic_params(
        &self,
        declaring: &TypeHandle,
        names: &[&str],
    ) -> Result<Vec<GenericParamHandle>> {
        if names.iter().any(|name| name.is_empty()) {
            return Err(Error::EmptyEntity("generic parameter name"));
        }
        self.check_container(declaring.container)?;

        let mut state = write_lock!(self.state);
        if state.committed {
            return Err(Error::AlreadyCommitted);
        }

        let members = {
            let record = state
                .types
                .get(declaring.token.pending_index() as usize)
                .ok_or(Error::UnknownHandle)?;
            if record.created.is_some() {
                return Err(Error::AlreadyCreated(record.name.clone()));
            }
            Arc::clone(&record.generics)
        };

        let start = members.count();
        let mut handles = Vec::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            if state.generics.len() > Token::MAX_ROW as usize {
                return Err(Error::TokenOverflow(TableId::GenericParam as u8));
            }
            let number = u16::try_from(start + position)
                .map_err(|_| Error::TokenOverflow(TableId::GenericParam as u8))?;
            let token = Token::pending(TableId::GenericParam, state.generics.len() as u32);
            members.push(token);
            state.generics.push(PendingGenericParam {
                token,
                number,
                name: (*name).to_string(),
                attributes: GenericParamAttributes::empty(),
                constraints: Vec::new(),
                created: None,
            });
            handles.push(GenericParamHandle {
                container: self.id,
                token,
            });
        }
        Ok(handles)
    }

    /// Sets the variance and special-constraint flags of a generic
    /// parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyCreated`] once the owning type was created,
    /// plus the usual handle contract.
    pub fn set_generic_param_attributes(
        &self,
        param: &GenericParamHandle,
        attributes: GenericParamAttributes,
    ) -> Result<()> {
        self.check_container(param.container)?;
        let mut state = write_lock!(self.state);
        let record = state
            .generics
            .get_mut(param.token.pending_index() as usize)
            .ok_or(Error::UnknownHandle)?;
        if record.created.is_some() {
            return Err(Error::AlreadyCreated(record.name.clone()));
        }
        record.attributes = attributes;
        Ok(())
    }

    /// Replaces the constraint list of a generic parameter.
    ///
    /// Constraint tokens may be pending; they are resolved when the owning
    /// type is created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyCreated`] once the owning type was created,
    /// plus the usual handle contract.
    pub fn set_constraints(
        &self,
        param: &GenericParamHandle,
        constraints: &[Token],
    ) -> Result<()> {
        self.check_container(param.container)?;
        let mut state = write_lock!(self.state);
        let record = state
            .generics
            .get_mut(param.token.pending_index() as usize)
            .ok_or(Error::UnknownHandle)?;
        if record.created.is_some() {
            return Err(Error::AlreadyCreated(record.name.clone()));
        }
        record.constraints = constraints.to_vec();
        Ok(())
    }

    // ── body emission ───────────────────────────────────────────────────

    /// Issues the instruction stream for a method, exactly once.
    ///
    /// The returned assembler is handed back through
    /// [`ModuleBuilder::bake`]. Methods that never request a stream stay
    /// body-less.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyStreamOpen`] on a second request,
    /// [`Error::AlreadyBaked`] once the body was baked, and
    /// [`Error::AlreadyCreated`] once the declaring type was finalized.
    pub fn il_stream(&self, method: &MethodHandle) -> Result<IlAssembler> {
        self.check_container(method.container)?;
        let mut state = write_lock!(self.state);
        if state.committed {
            return Err(Error::AlreadyCommitted);
        }
        let record = state
            .methods
            .get_mut(method.token.pending_index() as usize)
            .ok_or(Error::UnknownHandle)?;
        if record.created.is_some() {
            return Err(Error::AlreadyCreated(record.name.clone()));
        }
        match record.stream {
            StreamState::NotIssued => {
                let assembler = IlAssembler::new();
                record.stream = StreamState::Issued(assembler.id());
                Ok(assembler)
            }
            StreamState::Issued(_) => Err(Error::BodyStreamOpen(record.name.clone())),
            StreamState::Baked(_) => Err(Error::AlreadyBaked),
        }
    }

    /// Bakes a method body and submits it to the container.
    ///
    /// The assembler must be the one issued for this method by
    /// [`ModuleBuilder::il_stream`]. On success the frozen body is stored
    /// and shared.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyBaked`] on a second bake,
    /// [`Error::UnmatchedAssembler`] when the assembler was issued for a
    /// different method (or none was issued), and any structural error from
    /// [`IlAssembler::bake`] itself.
    pub fn bake(&self, method: &MethodHandle, assembler: IlAssembler) -> Result<Arc<MethodBody>> {
        self.check_container(method.container)?;
        let mut state = write_lock!(self.state);
        let record = state
            .methods
            .get_mut(method.token.pending_index() as usize)
            .ok_or(Error::UnknownHandle)?;
        match &record.stream {
            StreamState::Baked(_) => return Err(Error::AlreadyBaked),
            StreamState::Issued(id) if *id == assembler.id() => {}
            StreamState::Issued(_) | StreamState::NotIssued => {
                return Err(Error::UnmatchedAssembler)
            }
        }
        let body = Arc::new(assembler.bake()?);
        record.stream = StreamState::Baked(Arc::clone(&body));
        Ok(body)
    }

    // ── finalization ────────────────────────────────────────────────────

    /// Finalizes a type: resolves its references, creates its generic
    /// parameters, assigns final tokens to the type and every member, and
    /// publishes them in the created registries.
    ///
    /// Final rows are assigned in creation order across the container.
    /// Calling `create_type` again on a created type is a no-op returning
    /// the cached final token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StillPending`] when the parent, an interface, or a
    /// constraint references a pending type that was not created yet, and
    /// [`Error::BodyStreamOpen`] when a method's stream was issued but never
    /// baked.
    pub fn create_type(&self, ty: &TypeHandle) -> Result<Token> {
        self.check_container(ty.container)?;
        let type_index = ty.token.pending_index() as usize;
        let mut guard = write_lock!(self.state);
        let state = &mut *guard;

        let (generic_members, method_members, field_members, parent, interfaces) = {
            let record = state.types.get(type_index).ok_or(Error::UnknownHandle)?;
            if let Some(token) = record.created {
                return Ok(token);
            }
            (
                Arc::clone(&record.generics),
                Arc::clone(&record.methods),
                Arc::clone(&record.fields),
                record.parent,
                record.interfaces.clone(),
            )
        };

        // every reference this type carries must resolve now; a pending
        // reference requires its own create_type first
        let parent = parent
            .map(|token| resolve_pending(state, token))
            .transpose()?;
        let interfaces = interfaces
            .iter()
            .map(|token| resolve_pending(state, *token))
            .collect::<Result<Vec<Token>>>()?;
        let mut constraint_sets = Vec::with_capacity(generic_members.count());
        for (_, param_token) in generic_members.iter() {
            let record = state
                .generics
                .get(param_token.pending_index() as usize)
                .ok_or(Error::UnknownHandle)?;
            constraint_sets.push(
                record
                    .constraints
                    .iter()
                    .map(|token| resolve_pending(state, *token))
                    .collect::<Result<Vec<Token>>>()?,
            );
        }

        // a stream that was issued must have come back through bake
        for (_, method_token) in method_members.iter() {
            let record = state
                .methods
                .get(method_token.pending_index() as usize)
                .ok_or(Error::UnknownHandle)?;
            if matches!(record.stream, StreamState::Issued(_)) {
                return Err(Error::BodyStreamOpen(record.name.clone()));
            }
        }

        let type_token = Token::from_parts(
            TableId::TypeDef,
            Self::take_row(&self.next_type_row, TableId::TypeDef)?,
        );

        let mut generic_tokens = Vec::with_capacity(constraint_sets.len());
        for ((_, param_token), constraints) in generic_members.iter().zip(constraint_sets) {
            let row = Self::take_row(&self.next_generic_row, TableId::GenericParam)?;
            let created = Token::from_parts(TableId::GenericParam, row);
            let record = state
                .generics
                .get_mut(param_token.pending_index() as usize)
                .ok_or(Error::UnknownHandle)?;
            record.constraints = constraints;
            record.created = Some(created);
            self.created_generics.insert(
                created,
                Arc::new(GenericParamInfo {
                    token: created,
                    owner: type_token,
                    number: record.number,
                    name: record.name.clone(),
                    attributes: record.attributes,
                    constraints: record.constraints.clone(),
                }),
            );
            generic_tokens.push(created);
        }

        let mut method_tokens = Vec::with_capacity(method_members.count());
        for (_, method_token) in method_members.iter() {
            let row = Self::take_row(&self.next_method_row, TableId::MethodDef)?;
            let created = Token::from_parts(TableId::MethodDef, row);
            let record = state
                .methods
                .get_mut(method_token.pending_index() as usize)
                .ok_or(Error::UnknownHandle)?;
            record.created = Some(created);
            let body = match &record.stream {
                StreamState::Baked(body) => Some(Arc::clone(body)),
                _ => None,
            };
            self.created_methods.insert(
                created,
                Arc::new(MethodInfo {
                    token: created,
                    declaring_type: type_token,
                    name: record.name.clone(),
                    attributes: record.attributes,
                    signature: record.signature.clone(),
                    body,
                }),
            );
            method_tokens.push(created);
        }

        let mut field_tokens = Vec::with_capacity(field_members.count());
        for (_, field_token) in field_members.iter() {
            let row = Self::take_row(&self.next_field_row, TableId::Field)?;
            let created = Token::from_parts(TableId::Field, row);
            let record = state
                .fields
                .get_mut(field_token.pending_index() as usize)
                .ok_or(Error::UnknownHandle)?;
            record.created = Some(created);
            self.created_fields.insert(
                created,
                Arc::new(FieldInfo {
                    token: created,
                    declaring_type: type_token,
                    name: record.name.clone(),
                    attributes: record.attributes,
                    signature: record.signature.clone(),
                }),
            );
            field_tokens.push(created);
        }

        let record = state.types.get_mut(type_index).ok_or(Error::UnknownHandle)?;
        record.parent = parent;
        record.interfaces.clone_from(&interfaces);
        record.created = Some(type_token);
        self.created_types.insert(
            type_token,
            Arc::new(TypeInfo {
                token: type_token,
                name: record.name.clone(),
                attributes: record.attributes,
                parent,
                interfaces,
                generic_params: generic_tokens,
                methods: method_tokens,
                fields: field_tokens,
            }),
        );
        Ok(type_token)
    }

    // ── token surface ───────────────────────────────────────────────────

    /// Token of a type: pending until created, final afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignContainer`] or [`Error::UnknownHandle`] for
    /// a handle this container did not issue.
    pub fn type_token(&self, handle: &TypeHandle) -> Result<Token> {
        self.check_container(handle.container)?;
        let state = read_lock!(self.state);
        let record = state
            .types
            .get(handle.token.pending_index() as usize)
            .ok_or(Error::UnknownHandle)?;
        Ok(record.created.unwrap_or(record.token))
    }

    /// Token of a method: pending until its type is created, final
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Same contract as [`ModuleBuilder::type_token`].
    pub fn method_token(&self, handle: &MethodHandle) -> Result<Token> {
        self.check_container(handle.container)?;
        let state = read_lock!(self.state);
        let record = state
            .methods
            .get(handle.token.pending_index() as usize)
            .ok_or(Error::UnknownHandle)?;
        Ok(record.created.unwrap_or(record.token))
    }

    /// Token of a field: pending until its type is created, final
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Same contract as [`ModuleBuilder::type_token`].
    pub fn field_token(&self, handle: &FieldHandle) -> Result<Token> {
        self.check_container(handle.container)?;
        let state = read_lock!(self.state);
        let record = state
            .fields
            .get(handle.token.pending_index() as usize)
            .ok_or(Error::UnknownHandle)?;
        Ok(record.created.unwrap_or(record.token))
    }

    /// Interns a string constant and returns its `ldstr` token.
    ///
    /// Equal content always yields the identical token; the container
    /// accumulates the corresponding `#US` heap image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenOverflow`] when the heap outgrows the row
    /// space.
    pub fn string_token(&self, value: &str) -> Result<Token> {
        let mut state = write_lock!(self.state);
        state.interner.intern_string(value)
    }

    /// Interns an opaque signature blob and returns its standalone
    /// signature token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyEntity`] for an empty blob.
    pub fn signature_token(&self, blob: &[u8]) -> Result<Token> {
        let mut state = write_lock!(self.state);
        state.interner.intern_blob(blob)
    }

    /// Interns a reference to an external type by namespace and name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyEntity`] for an empty name.
    pub fn type_ref(&self, namespace: &str, name: &str) -> Result<Token> {
        let mut state = write_lock!(self.state);
        state.interner.intern_type_ref(namespace, name)
    }

    /// Interns a reference to a member of an external type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyEntity`] for an empty name or signature.
    pub fn member_ref(&self, parent: Token, name: &str, signature: &[u8]) -> Result<Token> {
        let mut state = write_lock!(self.state);
        state.interner.intern_member_ref(parent, name, signature)
    }

    /// Maps a pending token to its final token once the builder behind it
    /// was created. Final tokens map to themselves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StillPending`] while the builder has not been
    /// created.
    pub fn resolve_token(&self, token: Token) -> Result<Token> {
        if !token.is_pending() {
            return Ok(token);
        }
        let state = read_lock!(self.state);
        resolve_pending(&state, token)
    }

    /// Snapshot of the container's `#US` heap image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the container lock is poisoned.
    pub fn user_string_heap(&self) -> Result<Vec<u8>> {
        let state = read_lock!(self.state);
        Ok(state.interner.user_string_heap().to_vec())
    }

    // ── created registries ──────────────────────────────────────────────

    /// Looks up a created type by its final token.
    #[must_use]
    pub fn type_info(&self, token: Token) -> Option<Arc<TypeInfo>> {
        self.created_types
            .get(&token)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Looks up a created method by its final token.
    #[must_use]
    pub fn method_info(&self, token: Token) -> Option<Arc<MethodInfo>> {
        self.created_methods
            .get(&token)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Looks up a created field by its final token.
    #[must_use]
    pub fn field_info(&self, token: Token) -> Option<Arc<FieldInfo>> {
        self.created_fields
            .get(&token)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Looks up a created generic parameter by its final token.
    #[must_use]
    pub fn generic_param_info(&self, token: Token) -> Option<Arc<GenericParamInfo>> {
        self.created_generics
            .get(&token)
            .map(|entry| Arc::clone(entry.value()))
    }

    // ── commit ──────────────────────────────────────────────────────────

    /// Commits the container: patches every baked body's pending-token
    /// relocations to final tokens and hands the encoded bodies to `sink`
    /// in final-token order. One-shot per container.
    ///
    /// Local-variable signatures are interned as standalone signature
    /// blobs here, so bodies sharing a local layout share the signature
    /// token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyCommitted`] on a second commit,
    /// [`Error::StillPending`] when any builder was never created, and any
    /// error the sink raises. A failed commit leaves the container
    /// uncommitted; bodies already handed over stay with the sink.
    pub fn commit(&self, sink: &mut dyn BodySink) -> Result<()> {
        let mut guard = write_lock!(self.state);
        let state = &mut *guard;
        if state.committed {
            return Err(Error::AlreadyCommitted);
        }

        for record in &state.types {
            if record.created.is_none() {
                return Err(Error::StillPending(record.token));
            }
        }
        for record in &state.methods {
            if record.created.is_none() {
                return Err(Error::StillPending(record.token));
            }
        }
        for record in &state.fields {
            if record.created.is_none() {
                return Err(Error::StillPending(record.token));
            }
        }
        for record in &state.generics {
            if record.created.is_none() {
                return Err(Error::StillPending(record.token));
            }
        }

        // ordered iteration over the registry gives final-token order
        for entry in self.created_methods.iter() {
            let info = entry.value();
            let Some(body) = info.body.as_ref() else {
                continue;
            };
            let local_sig_token = match body.local_signature.as_deref() {
                Some(blob) => Some(state.interner.intern_blob(blob)?),
                None => None,
            };
            let encoded = body.encode(local_sig_token, |token| resolve_pending(state, token))?;
            sink.accept(info.token, &encoded)?;
        }

        state.committed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{emit::opcodes, metadata::signatures::{method_signature, MethodSig}};

    fn static_void_sig() -> Vec<u8> {
        method_signature(&MethodSig::default()).unwrap()
    }

    fn module_with_type() -> (ModuleBuilder, TypeHandle) {
        let module = ModuleBuilder::new("test");
        let handle = module
            .define_type("Widget", TypeAttributes::PUBLIC, None, &[])
            .unwrap();
        (module, handle)
    }

    #[test]
    fn definition_arguments_are_validated() {
        let module = ModuleBuilder::new("test");
        assert!(matches!(
            module.define_type("", TypeAttributes::PUBLIC, None, &[]),
            Err(Error::EmptyEntity("type name"))
        ));

        let widget = module
            .define_type("Widget", TypeAttributes::PUBLIC, None, &[])
            .unwrap();
        assert!(matches!(
            module.define_type("Widget", TypeAttributes::empty(), None, &[]),
            Err(Error::DuplicateTypeName(name)) if name == "Widget"
        ));
        assert!(matches!(
            module.define_method(&widget, "", MethodAttributes::PUBLIC, &static_void_sig()),
            Err(Error::EmptyEntity("method name"))
        ));
        assert!(matches!(
            module.define_method(&widget, "Run", MethodAttributes::PUBLIC, &[]),
            Err(Error::EmptyEntity("method signature"))
        ));
    }

    #[test]
    fn handles_are_container_scoped() {
        let (first, widget) = module_with_type();
        let second = ModuleBuilder::new("other");
        assert!(matches!(
            second.define_method(&widget, "Run", MethodAttributes::PUBLIC, &static_void_sig()),
            Err(Error::ForeignContainer)
        ));
        assert!(matches!(
            second.type_token(&widget),
            Err(Error::ForeignContainer)
        ));
        assert!(first.type_token(&widget).is_ok());
    }

    #[test]
    fn tokens_are_pending_until_created() {
        let (module, widget) = module_with_type();
        let pending = module.type_token(&widget).unwrap();
        assert!(pending.is_pending());
        assert_eq!(pending.table(), TableId::TypeDef as u8);

        assert!(matches!(
            module.resolve_token(pending),
            Err(Error::StillPending(token)) if token == pending
        ));

        let created = module.create_type(&widget).unwrap();
        assert!(!created.is_pending());
        assert_eq!(module.type_token(&widget).unwrap(), created);
        assert_eq!(module.resolve_token(pending).unwrap(), created);
        // final tokens resolve to themselves
        assert_eq!(module.resolve_token(created).unwrap(), created);
    }

    #[test]
    fn created_types_freeze_their_member_lists() {
        let (module, widget) = module_with_type();
        module.create_type(&widget).unwrap();
        assert!(matches!(
            module.define_method(&widget, "Run", MethodAttributes::PUBLIC, &static_void_sig()),
            Err(Error::AlreadyCreated(name)) if name == "Widget"
        ));
        assert!(matches!(
            module.define_field(
                &widget,
                "count",
                FieldAttributes::PRIVATE,
                &[0x06, 0x08]
            ),
            Err(Error::AlreadyCreated(_))
        ));
    }

    #[test]
    fn create_type_is_idempotent() {
        let (module, widget) = module_with_type();
        let first = module.create_type(&widget).unwrap();
        let second = module.create_type(&widget).unwrap();
        assert_eq!(first, second);
        assert_eq!(module.type_info(first).unwrap().name, "Widget");
    }

    #[test]
    fn final_rows_follow_creation_order() {
        let module = ModuleBuilder::new("test");
        let alpha = module
            .define_type("Alpha", TypeAttributes::PUBLIC, None, &[])
            .unwrap();
        let beta = module
            .define_type("Beta", TypeAttributes::PUBLIC, None, &[])
            .unwrap();

        // Beta is created first and takes row 1
        assert_eq!(module.create_type(&beta).unwrap().value(), 0x0200_0001);
        assert_eq!(module.create_type(&alpha).unwrap().value(), 0x0200_0002);
    }

    #[test]
    fn pending_parent_must_be_created_first() {
        let module = ModuleBuilder::new("test");
        let base = module
            .define_type("Base", TypeAttributes::PUBLIC, None, &[])
            .unwrap();
        let base_token = module.type_token(&base).unwrap();
        let derived = module
            .define_type("Derived", TypeAttributes::PUBLIC, Some(base_token), &[])
            .unwrap();

        assert!(matches!(
            module.create_type(&derived),
            Err(Error::StillPending(token)) if token == base_token
        ));

        let base_final = module.create_type(&base).unwrap();
        let derived_token = module.create_type(&derived).unwrap();
        let info = module.type_info(derived_token).unwrap();
        assert_eq!(info.parent, Some(base_final));
    }

    #[test]
    fn body_streams_are_issued_exactly_once() {
        let (module, widget) = module_with_type();
        let run = module
            .define_method(&widget, "Run", MethodAttributes::PUBLIC, &static_void_sig())
            .unwrap();

        let mut il = module.il_stream(&run).unwrap();
        assert!(matches!(
            module.il_stream(&run),
            Err(Error::BodyStreamOpen(name)) if name == "Run"
        ));

        il.emit(&opcodes::RET).unwrap();
        module.bake(&run, il).unwrap();
        assert!(matches!(module.il_stream(&run), Err(Error::AlreadyBaked)));
    }

    #[test]
    fn bake_matches_assembler_to_method() {
        let (module, widget) = module_with_type();
        let first = module
            .define_method(&widget, "First", MethodAttributes::PUBLIC, &static_void_sig())
            .unwrap();
        let second = module
            .define_method(&widget, "Second", MethodAttributes::PUBLIC, &static_void_sig())
            .unwrap();

        let mut il = module.il_stream(&first).unwrap();
        il.emit(&opcodes::RET).unwrap();

        // wrong method, never issued a stream
        let stray = IlAssembler::new();
        assert!(matches!(
            module.bake(&second, stray),
            Err(Error::UnmatchedAssembler)
        ));

        let body = module.bake(&first, il).unwrap();
        assert_eq!(body.code, vec![0x2A]);
        assert!(matches!(
            module.bake(&first, IlAssembler::new()),
            Err(Error::AlreadyBaked)
        ));
    }

    #[test]
    fn open_streams_block_create() {
        let (module, widget) = module_with_type();
        let run = module
            .define_method(&widget, "Run", MethodAttributes::PUBLIC, &static_void_sig())
            .unwrap();
        let _il = module.il_stream(&run).unwrap();

        assert!(matches!(
            module.create_type(&widget),
            Err(Error::BodyStreamOpen(name)) if name == "Run"
        ));
    }

    #[test]
    fn generic_params_are_created_with_their_type() {
        let (module, widget) = module_with_type();
        let params = module
            .define_generic_params(&widget, &["TKey", "TValue"])
            .unwrap();
        assert_eq!(params.len(), 2);

        let comparable = module.type_ref("System", "IComparable").unwrap();
        module.set_constraints(&params[0], &[comparable]).unwrap();
        module
            .set_generic_param_attributes(
                &params[0],
                GenericParamAttributes::REFERENCE_TYPE_CONSTRAINT,
            )
            .unwrap();

        let token = module.create_type(&widget).unwrap();
        let info = module.type_info(token).unwrap();
        assert_eq!(info.generic_params.len(), 2);

        let key = module.generic_param_info(info.generic_params[0]).unwrap();
        assert_eq!(key.name, "TKey");
        assert_eq!(key.number, 0);
        assert_eq!(key.owner, token);
        assert_eq!(key.constraints, vec![comparable]);
        assert_eq!(
            key.attributes,
            GenericParamAttributes::REFERENCE_TYPE_CONSTRAINT
        );

        let value = module.generic_param_info(info.generic_params[1]).unwrap();
        assert_eq!(value.number, 1);
        assert!(matches!(
            module.set_constraints(&params[1], &[comparable]),
            Err(Error::AlreadyCreated(_))
        ));
    }

    #[test]
    fn commit_requires_every_builder_created() {
        let (module, _widget) = module_with_type();
        let result = module.commit(&mut |_method: Token, _body: &[u8]| Ok(()));
        assert!(matches!(result, Err(Error::StillPending(_))));
    }

    #[test]
    fn commit_is_one_shot() {
        let (module, widget) = module_with_type();
        module.create_type(&widget).unwrap();

        module
            .commit(&mut |_method: Token, _body: &[u8]| Ok(()))
            .unwrap();
        assert!(matches!(
            module.commit(&mut |_method: Token, _body: &[u8]| Ok(())),
            Err(Error::AlreadyCommitted)
        ));
        assert!(matches!(
            module.define_type("Late", TypeAttributes::PUBLIC, None, &[]),
            Err(Error::AlreadyCommitted)
        ));
    }

    #[test]
    fn module_identity_is_stable_and_unique() {
        let first = ModuleBuilder::new("app");
        let second = ModuleBuilder::new("app");
        assert_eq!(first.name(), "app");
        assert_ne!(first.mvid(), second.mvid());
        assert_eq!(first.mvid(), first.mvid());
    }
}

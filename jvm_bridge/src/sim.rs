//! In-process stand-in for a managed runtime.
//!
//! `SimRuntime` implements `ForeignRuntime` with the same observable rules
//! as JNI, so the bridge can be exercised without a JVM:
//!   - failed lookups return `None` and leave `NoClassDefFoundError` /
//!     `NoSuchMethodError` / `NoSuchFieldError` pending
//!   - a method that throws leaves its throwable pending and returns the
//!     zero value of its return kind
//!   - local and global references live in separate tables and must be
//!     deleted explicitly
//!
//! Nothing is enforced beyond that; misuse is counted in `SimStats`
//! (calls made while an exception was pending, stale or doubly released
//! references) so tests can assert the bridge never does it.
//!
//! Classes are described with `ClassDef`: constructors build the native
//! state of a new object, methods receive a `SimContext` to inspect and
//! mutate objects.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::{Arg, ForeignRuntime, ReturnKind, Value};

pub type ObjectId = u32;

pub const STRING_CLASS: &str = "java/lang/String";
pub const BYTE_ARRAY_CLASS: &str = "[B";

const THROWABLE_CLASS: &str = "java/lang/Throwable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimType(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimMethod(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimField(usize);

/// A local or global reference id.
#[derive(Debug, PartialEq, Eq)]
pub struct SimRef(u32);

/// A call argument as seen by a simulated method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimArg {
    Int(i32),
    Long(i64),
    Object(Option<ObjectId>),
}

impl SimArg {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            SimArg::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            SimArg::Object(id) => *id,
            _ => None,
        }
    }
}

/// The value a simulated method body returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimValue {
    Void,
    Int(i32),
    Long(i64),
    Object(Option<ObjectId>),
}

/// An exception thrown by a simulated method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thrown {
    pub class: String,
    pub message: Option<String>,
    /// `getMessage()` on this throwable itself throws.
    pub failing_message: bool,
}

impl Thrown {
    pub fn new(class: &str, message: impl Into<String>) -> Self {
        Self {
            class: class.to_string(),
            message: Some(message.into()),
            failing_message: false,
        }
    }

    pub fn without_message(class: &str) -> Self {
        Self {
            class: class.to_string(),
            message: None,
            failing_message: false,
        }
    }

    pub fn with_failing_message(class: &str) -> Self {
        Self {
            class: class.to_string(),
            message: None,
            failing_message: true,
        }
    }
}

type CtorBody = Rc<dyn Fn(&mut SimContext<'_>, &[SimArg]) -> Result<Box<dyn Any>, Thrown>>;
type MethodBody = Rc<dyn Fn(&mut SimContext<'_>, ObjectId, &[SimArg]) -> Result<SimValue, Thrown>>;

enum Body {
    Constructor(CtorBody),
    Method(MethodBody),
}

/// Description of a simulated class.
pub struct ClassDef {
    name: String,
    members: Vec<(String, String, Body)>,
    statics: Vec<(String, String, Box<dyn Any>)>,
}

impl ClassDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: Vec::new(),
            statics: Vec::new(),
        }
    }

    pub fn constructor<F>(mut self, signature: &str, body: F) -> Self
    where
        F: Fn(&mut SimContext<'_>, &[SimArg]) -> Result<Box<dyn Any>, Thrown> + 'static,
    {
        self.members.push((
            "<init>".to_string(),
            signature.to_string(),
            Body::Constructor(Rc::new(body)),
        ));
        self
    }

    pub fn method<F>(mut self, name: &str, signature: &str, body: F) -> Self
    where
        F: Fn(&mut SimContext<'_>, ObjectId, &[SimArg]) -> Result<SimValue, Thrown> + 'static,
    {
        self.members.push((
            name.to_string(),
            signature.to_string(),
            Body::Method(Rc::new(body)),
        ));
        self
    }

    /// A static field holding an instance of this class with `state`.
    pub fn static_object(mut self, name: &str, signature: &str, state: impl Any) -> Self {
        let state: Box<dyn Any> = Box::new(state);
        self.statics
            .push((name.to_string(), signature.to_string(), state));
        self
    }
}

/// Misuse and lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimStats {
    pub types_resolved: usize,
    pub types_released: usize,
    pub live_locals: usize,
    pub live_globals: usize,
    pub globals_created: usize,
    pub calls_while_pending: usize,
    pub stale_ref_uses: usize,
    pub double_releases: usize,
    pub pins: usize,
}

impl SimStats {
    pub fn live_types(&self) -> usize {
        self.types_resolved - self.types_released
    }
}

enum ObjectData {
    Native(Box<dyn Any>),
    Bytes(Vec<u8>),
    Text(String),
    Throwable {
        message: Option<String>,
        failing_message: bool,
    },
}

struct SimObject {
    class: String,
    data: ObjectData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefKind {
    Local,
    Global,
}

struct SimClass {
    name: String,
}

struct MemberEntry {
    class: usize,
    name: String,
    signature: String,
    body: Body,
}

struct FieldEntry {
    class: usize,
    name: String,
    signature: String,
    object: ObjectId,
}

#[derive(Default)]
struct SimState {
    classes: Vec<SimClass>,
    members: Vec<MemberEntry>,
    fields: Vec<FieldEntry>,
    objects: Vec<SimObject>,
    refs: HashMap<u32, (ObjectId, RefKind)>,
    next_ref: u32,
    pending: Option<ObjectId>,
    fail_allocations: bool,
    object_on_throw: bool,
    stats: SimStats,
}

impl SimState {
    fn alloc(&mut self, class: &str, data: ObjectData) -> ObjectId {
        self.objects.push(SimObject {
            class: class.to_string(),
            data,
        });
        (self.objects.len() - 1) as ObjectId
    }

    fn new_ref(&mut self, object: ObjectId, kind: RefKind) -> SimRef {
        self.next_ref += 1;
        self.refs.insert(self.next_ref, (object, kind));
        match kind {
            RefKind::Local => self.stats.live_locals += 1,
            RefKind::Global => {
                self.stats.live_globals += 1;
                self.stats.globals_created += 1;
            }
        }
        SimRef(self.next_ref)
    }

    fn object_of(&mut self, reference: &SimRef) -> Option<ObjectId> {
        let found = self.refs.get(&reference.0).map(|&(object, _)| object);
        if found.is_none() {
            self.stats.stale_ref_uses += 1;
        }
        found
    }

    fn delete_ref(&mut self, reference: SimRef, expected: RefKind) {
        let live = matches!(self.refs.get(&reference.0), Some(&(_, kind)) if kind == expected);
        if !live {
            self.stats.double_releases += 1;
            return;
        }
        self.refs.remove(&reference.0);
        match expected {
            RefKind::Local => self.stats.live_locals -= 1,
            RefKind::Global => self.stats.live_globals -= 1,
        }
    }

    fn note_call(&mut self) {
        if self.pending.is_some() {
            self.stats.calls_while_pending += 1;
        }
    }

    fn raise(&mut self, thrown: Thrown) {
        let id = self.alloc(
            &thrown.class,
            ObjectData::Throwable {
                message: thrown.message,
                failing_message: thrown.failing_message,
            },
        );
        self.pending = Some(id);
    }

    fn find_member(&self, class: usize, name: &str, signature: &str) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.class == class && m.name == name && m.signature == signature)
    }

    fn convert_args(&mut self, args: &[Arg<'_, SimRef>]) -> Vec<SimArg> {
        args.iter()
            .map(|arg| match arg {
                Arg::Int(v) => SimArg::Int(*v),
                Arg::Long(v) => SimArg::Long(*v),
                Arg::Object(reference) => SimArg::Object(self.object_of(reference)),
                Arg::Null => SimArg::Object(None),
            })
            .collect()
    }
}

/// Access to the simulated heap from inside a method body.
pub struct SimContext<'a> {
    state: &'a mut SimState,
}

impl SimContext<'_> {
    /// The native state of `object`, if it is a `T`.
    pub fn state<T: Any>(&mut self, object: ObjectId) -> Option<&mut T> {
        match &mut self.state.objects.get_mut(object as usize)?.data {
            ObjectData::Native(state) => (**state).downcast_mut::<T>(),
            _ => None,
        }
    }

    pub fn bytes(&self, object: ObjectId) -> Option<&[u8]> {
        match &self.state.objects.get(object as usize)?.data {
            ObjectData::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn string(&self, object: ObjectId) -> Option<&str> {
        match &self.state.objects.get(object as usize)?.data {
            ObjectData::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn class_of(&self, object: ObjectId) -> Option<&str> {
        self.state
            .objects
            .get(object as usize)
            .map(|o| o.class.as_str())
    }

    /// Allocate an object of `class` carrying `state`.
    pub fn new_object(&mut self, class: &str, state: impl Any) -> ObjectId {
        self.state.alloc(class, ObjectData::Native(Box::new(state)))
    }

    pub fn new_string(&mut self, value: &str) -> ObjectId {
        self.state
            .alloc(STRING_CLASS, ObjectData::Text(value.to_string()))
    }
}

/// Handle onto one simulated execution context.
#[derive(Clone)]
pub struct SimRuntime {
    state: Rc<RefCell<SimState>>,
}

impl Default for SimRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRuntime {
    /// A runtime with `java/lang/Throwable` predefined.
    pub fn new() -> Self {
        let runtime = Self {
            state: Rc::new(RefCell::new(SimState::default())),
        };
        runtime.define(ClassDef::new(THROWABLE_CLASS).method(
            "getMessage",
            "()Ljava/lang/String;",
            throwable_get_message,
        ));
        runtime
    }

    /// Register a class so that `find_type` can resolve it.
    pub fn define(&self, def: ClassDef) {
        let mut state = self.state.borrow_mut();
        state.classes.push(SimClass {
            name: def.name.clone(),
        });
        let class = state.classes.len() - 1;
        for (name, signature, body) in def.members {
            state.members.push(MemberEntry {
                class,
                name,
                signature,
                body,
            });
        }
        for (name, signature, value) in def.statics {
            let object = state.alloc(&def.name, ObjectData::Native(value));
            state.fields.push(FieldEntry {
                class,
                name,
                signature,
                object,
            });
        }
    }

    pub fn stats(&self) -> SimStats {
        self.state.borrow().stats.clone()
    }

    /// Make the pending exception `thrown`, as if a call had raised it.
    pub fn raise(&self, thrown: Thrown) {
        self.state.borrow_mut().raise(thrown);
    }

    /// The class of the pending throwable, if any.
    pub fn pending_class(&self) -> Option<String> {
        let state = self.state.borrow();
        let id = state.pending?;
        Some(state.objects[id as usize].class.clone())
    }

    /// Make every byte-array allocation fail with `OutOfMemoryError`.
    pub fn fail_allocations(&self, fail: bool) {
        self.state.borrow_mut().fail_allocations = fail;
    }

    /// When a body throws from an object-returning call, return a live
    /// reference anyway. Some runtimes do; callers must not trust it.
    pub fn return_object_on_throw(&self, enabled: bool) {
        self.state.borrow_mut().object_on_throw = enabled;
    }

    fn run_body(
        &self,
        body: &Body,
        this: Option<ObjectId>,
        args: &[SimArg],
    ) -> Result<SimResult, Thrown> {
        let mut state = self.state.borrow_mut();
        let mut ctx = SimContext { state: &mut *state };
        match (body, this) {
            (Body::Constructor(ctor), _) => ctor(&mut ctx, args).map(SimResult::Constructed),
            (Body::Method(method), Some(this)) => {
                method(&mut ctx, this, args).map(SimResult::Returned)
            }
            (Body::Method(_), None) => Err(Thrown::without_message("java/lang/NullPointerException")),
        }
    }

    fn body_of(&self, index: usize) -> Option<Body> {
        let state = self.state.borrow();
        state.members.get(index).map(|m| match &m.body {
            Body::Constructor(ctor) => Body::Constructor(Rc::clone(ctor)),
            Body::Method(method) => Body::Method(Rc::clone(method)),
        })
    }

    fn zero_value(&self, ret: ReturnKind) -> Value<SimRef> {
        match ret {
            ReturnKind::Void => Value::Void,
            ReturnKind::Int => Value::Int(0),
            ReturnKind::Long => Value::Long(0),
            ReturnKind::Object => {
                let mut state = self.state.borrow_mut();
                if state.object_on_throw {
                    let id = state.alloc("java/lang/Object", ObjectData::Text(String::new()));
                    Value::Object(Some(state.new_ref(id, RefKind::Local)))
                } else {
                    Value::Object(None)
                }
            }
        }
    }
}

enum SimResult {
    Constructed(Box<dyn Any>),
    Returned(SimValue),
}

fn throwable_get_message(
    ctx: &mut SimContext<'_>,
    this: ObjectId,
    _args: &[SimArg],
) -> Result<SimValue, Thrown> {
    let (message, failing) = match &ctx.state.objects[this as usize].data {
        ObjectData::Throwable {
            message,
            failing_message,
        } => (message.clone(), *failing_message),
        _ => (None, false),
    };
    if failing {
        return Err(Thrown::new(
            "java/lang/IllegalStateException",
            "getMessage failed",
        ));
    }
    Ok(SimValue::Object(message.map(|m| ctx.new_string(&m))))
}

impl ForeignRuntime for SimRuntime {
    type Type = SimType;
    type Method = SimMethod;
    type Field = SimField;
    type Ref = SimRef;

    fn find_type(&self, name: &str) -> Option<SimType> {
        let mut state = self.state.borrow_mut();
        state.note_call();
        let found = state.classes.iter().position(|c| c.name == name);
        match found {
            Some(index) => {
                state.stats.types_resolved += 1;
                Some(SimType(index))
            }
            None => {
                state.raise(Thrown::new("java/lang/NoClassDefFoundError", name));
                None
            }
        }
    }

    fn find_method(&self, ty: &SimType, name: &str, signature: &str) -> Option<SimMethod> {
        let mut state = self.state.borrow_mut();
        state.note_call();
        let found = state.find_member(ty.0, name, signature);
        match found {
            Some(index) => Some(SimMethod(index)),
            None => {
                state.raise(Thrown::new("java/lang/NoSuchMethodError", name));
                None
            }
        }
    }

    fn find_static_field(&self, ty: &SimType, name: &str, signature: &str) -> Option<SimField> {
        let mut state = self.state.borrow_mut();
        state.note_call();
        let found = state
            .fields
            .iter()
            .position(|f| f.class == ty.0 && f.name == name && f.signature == signature);
        match found {
            Some(index) => Some(SimField(index)),
            None => {
                state.raise(Thrown::new("java/lang/NoSuchFieldError", name));
                None
            }
        }
    }

    fn release_type(&self, _ty: SimType) {
        self.state.borrow_mut().stats.types_released += 1;
    }

    fn construct(&self, ty: &SimType, ctor: SimMethod, args: &[Arg<'_, SimRef>]) -> Option<SimRef> {
        let (class_name, args) = {
            let mut state = self.state.borrow_mut();
            state.note_call();
            let class_name = state.classes.get(ty.0)?.name.clone();
            (class_name, state.convert_args(args))
        };
        let body = self.body_of(ctor.0)?;

        match self.run_body(&body, None, &args) {
            Ok(SimResult::Constructed(native)) => {
                let mut state = self.state.borrow_mut();
                let id = state.alloc(&class_name, ObjectData::Native(native));
                Some(state.new_ref(id, RefKind::Local))
            }
            Ok(SimResult::Returned(_)) => None,
            Err(thrown) => {
                self.state.borrow_mut().raise(thrown);
                None
            }
        }
    }

    fn invoke(
        &self,
        target: &SimRef,
        method: SimMethod,
        ret: ReturnKind,
        args: &[Arg<'_, SimRef>],
    ) -> Value<SimRef> {
        let (this, args) = {
            let mut state = self.state.borrow_mut();
            state.note_call();
            (state.object_of(target), state.convert_args(args))
        };
        let Some(body) = self.body_of(method.0) else {
            self.raise(Thrown::new("java/lang/NoSuchMethodError", "invalid method id"));
            return self.zero_value(ret);
        };

        match self.run_body(&body, this, &args) {
            Ok(SimResult::Returned(value)) => {
                let mut state = self.state.borrow_mut();
                match value {
                    SimValue::Void => Value::Void,
                    SimValue::Int(v) => Value::Int(v),
                    SimValue::Long(v) => Value::Long(v),
                    SimValue::Object(None) => Value::Object(None),
                    SimValue::Object(Some(id)) => {
                        Value::Object(Some(state.new_ref(id, RefKind::Local)))
                    }
                }
            }
            Ok(SimResult::Constructed(_)) => Value::Void,
            Err(thrown) => {
                self.raise(thrown);
                self.zero_value(ret)
            }
        }
    }

    fn read_static(&self, _ty: &SimType, field: SimField) -> Option<SimRef> {
        let mut state = self.state.borrow_mut();
        state.note_call();
        let object = state.fields.get(field.0)?.object;
        Some(state.new_ref(object, RefKind::Local))
    }

    fn exception_pending(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    fn exception_occurred(&self) -> Option<SimRef> {
        let mut state = self.state.borrow_mut();
        let pending = state.pending?;
        Some(state.new_ref(pending, RefKind::Local))
    }

    fn exception_clear(&self) {
        self.state.borrow_mut().pending = None;
    }

    fn promote(&self, local: &SimRef) -> Option<SimRef> {
        let mut state = self.state.borrow_mut();
        state.note_call();
        let object = state.object_of(local)?;
        Some(state.new_ref(object, RefKind::Global))
    }

    fn delete_local(&self, local: SimRef) {
        self.state.borrow_mut().delete_ref(local, RefKind::Local);
    }

    fn delete_durable(&self, durable: SimRef) {
        self.state.borrow_mut().delete_ref(durable, RefKind::Global);
    }

    fn new_byte_array(&self, len: usize) -> Option<SimRef> {
        let mut state = self.state.borrow_mut();
        state.note_call();
        if state.fail_allocations {
            state.raise(Thrown::new("java/lang/OutOfMemoryError", "Java heap space"));
            return None;
        }
        let id = state.alloc(BYTE_ARRAY_CLASS, ObjectData::Bytes(vec![0; len]));
        Some(state.new_ref(id, RefKind::Local))
    }

    fn byte_array_len(&self, array: &SimRef) -> Option<usize> {
        let mut state = self.state.borrow_mut();
        state.note_call();
        let id = state.object_of(array)?;
        match &state.objects[id as usize].data {
            ObjectData::Bytes(bytes) => Some(bytes.len()),
            _ => None,
        }
    }

    fn with_pinned_bytes<T>(&self, array: &SimRef, f: impl FnOnce(&mut [u8]) -> T) -> Option<T> {
        // The borrow is held across `f`: any runtime call made while pinned
        // panics with a BorrowMutError.
        let mut state = self.state.borrow_mut();
        state.note_call();
        let id = state.object_of(array)?;
        state.stats.pins += 1;
        match &mut state.objects[id as usize].data {
            ObjectData::Bytes(bytes) => Some(f(bytes.as_mut_slice())),
            _ => None,
        }
    }

    fn new_string(&self, value: &str) -> Option<SimRef> {
        let mut state = self.state.borrow_mut();
        state.note_call();
        let id = state.alloc(STRING_CLASS, ObjectData::Text(value.to_string()));
        Some(state.new_ref(id, RefKind::Local))
    }

    fn read_string(&self, string: &SimRef) -> Option<String> {
        let mut state = self.state.borrow_mut();
        state.note_call();
        let id = state.object_of(string)?;
        match &state.objects[id as usize].data {
            ObjectData::Text(text) => Some(text.clone()),
            _ => None,
        }
    }
}

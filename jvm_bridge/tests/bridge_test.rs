//! Boundary tests for jvm_bridge, driven through the in-process runtime.
//!
//! Every test ends by checking the runtime's counters: no call made while
//! an exception was pending, no stale or double release.

use jvm_bridge::descriptors::DescriptorCache;
use jvm_bridge::error::{BridgeError, DescriptorError, ForeignError};
use jvm_bridge::handle::{OwningHandle, Scope};
use jvm_bridge::marshal;
use jvm_bridge::runtime::{Arg, ForeignRuntime, ReturnKind};
use jvm_bridge::sim::{ClassDef, SimArg, SimRuntime, SimStats, SimValue, Thrown};
use jvm_bridge::{MemberSpec, TypeSpec};

const COUNTER: &str = "demo/Counter";

const COUNTER_SPEC: TypeSpec = TypeSpec {
    name: COUNTER,
    members: &[
        MemberSpec::constructor("()V"),
        MemberSpec::method("next", "()J"),
        MemberSpec::method("fail", "()Ldemo/Counter;"),
        MemberSpec::method("mute", "()V"),
        MemberSpec::method("poisoned", "()V"),
        MemberSpec::method("length", "([B)I"),
        MemberSpec::static_field("ORIGIN", "Ldemo/Counter;"),
    ],
};

struct Counter {
    value: i64,
}

fn counter_runtime() -> SimRuntime {
    let sim = SimRuntime::new();
    sim.define(
        ClassDef::new(COUNTER)
            .constructor("()V", |_, _| Ok(Box::new(Counter { value: 0 })))
            .method("next", "()J", |ctx, this, _| {
                let counter = ctx
                    .state::<Counter>(this)
                    .ok_or_else(|| Thrown::new("java/lang/ClassCastException", "not a counter"))?;
                counter.value += 1;
                Ok(SimValue::Long(counter.value))
            })
            .method("fail", "()Ldemo/Counter;", |_, _, _| {
                Err(Thrown::new("demo/CounterException", "counter exploded"))
            })
            .method("mute", "()V", |_, _, _| {
                Err(Thrown::without_message("demo/CounterException"))
            })
            .method("poisoned", "()V", |_, _, _| {
                Err(Thrown::with_failing_message("demo/CounterException"))
            })
            .method("length", "([B)I", |ctx, _, args| {
                let len = args
                    .first()
                    .and_then(SimArg::as_object)
                    .and_then(|array| ctx.bytes(array))
                    .map_or(-1, |bytes| bytes.len() as i32);
                Ok(SimValue::Int(len))
            })
            .static_object("ORIGIN", "Ldemo/Counter;", Counter { value: 100 }),
    );
    sim
}

fn assert_clean(stats: &SimStats) {
    assert_eq!(stats.calls_while_pending, 0, "called into a poisoned context");
    assert_eq!(stats.stale_ref_uses, 0, "used a released reference");
    assert_eq!(stats.double_releases, 0, "released a reference twice");
}

// ─────────────────────────────────────────────────────────────
// Descriptor cache
// ─────────────────────────────────────────────────────────────

#[test]
fn resolves_each_type_once_and_releases_once() {
    let sim = counter_runtime();
    // Listing the same type twice must not resolve it twice.
    let mut cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC, COUNTER_SPEC])
        .expect("resolve descriptors");

    assert_eq!(cache.type_count(), 2, "Throwable + Counter");
    assert_eq!(sim.stats().types_resolved, 2);

    cache.teardown();
    cache.teardown();
    assert!(cache.is_torn_down());

    let stats = sim.stats();
    assert_eq!(stats.types_released, 2);
    assert_eq!(stats.live_types(), 0);
    assert_clean(&stats);

    drop(cache);
    assert_eq!(sim.stats().types_released, 2, "drop after teardown is a no-op");
}

#[test]
fn lookups_after_teardown_fail() {
    let sim = counter_runtime();
    let mut cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");
    cache.teardown();
    assert_eq!(cache.method(COUNTER, "next"), Err(DescriptorError::TornDown));
    assert!(matches!(cache.type_of(COUNTER), Err(DescriptorError::TornDown)));
}

#[test]
fn missing_type_is_fatal_and_leaves_nothing_behind() {
    const MISSING: TypeSpec = TypeSpec {
        name: "demo/DoesNotExist",
        members: &[],
    };
    let sim = counter_runtime();

    let err = DescriptorCache::resolve(&sim, &[COUNTER_SPEC, MISSING])
        .err()
        .expect("resolution must fail");

    match err {
        DescriptorError::TypeNotFound { type_name, cause } => {
            assert_eq!(type_name, "demo/DoesNotExist");
            assert_eq!(cause.message(), Some("demo/DoesNotExist"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let stats = sim.stats();
    assert!(!sim.exception_pending(), "lookup failure must be cleared");
    assert_eq!(stats.live_types(), 0, "partially resolved types released");
    assert_clean(&stats);
}

#[test]
fn missing_member_reports_signature() {
    const BAD: TypeSpec = TypeSpec {
        name: COUNTER,
        members: &[MemberSpec::method("next", "()I")],
    };
    let sim = counter_runtime();

    let err = DescriptorCache::resolve(&sim, &[BAD]).err().expect("must fail");
    assert!(matches!(
        err,
        DescriptorError::MemberNotFound { ref member, ref signature, .. }
            if member == "next" && signature == "()I"
    ));
    assert!(!sim.exception_pending());
    assert_eq!(sim.stats().live_types(), 0);
}

#[test]
fn kind_mismatch_and_unregistered_lookups() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");

    assert!(matches!(
        cache.method(COUNTER, "ORIGIN"),
        Err(DescriptorError::KindMismatch { .. })
    ));
    assert!(matches!(
        cache.static_field(COUNTER, "next"),
        Err(DescriptorError::KindMismatch { .. })
    ));
    assert!(matches!(
        cache.method(COUNTER, "reset"),
        Err(DescriptorError::Unregistered { .. })
    ));
    assert!(matches!(
        cache.type_of("demo/Other"),
        Err(DescriptorError::Unregistered { .. })
    ));
}

// ─────────────────────────────────────────────────────────────
// Exception translator
// ─────────────────────────────────────────────────────────────

#[test]
fn translator_extracts_message_and_clears() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");

    sim.raise(Thrown::new("demo/Boom", "something broke"));
    let err = cache.translator().check_and_clear().unwrap_err();
    assert_eq!(
        err,
        ForeignError::Raised {
            message: "something broke".to_string()
        }
    );
    assert!(!sim.exception_pending());

    // The very next call must run in a clean context.
    let counter = OwningHandle::construct(&cache, COUNTER, &[]).expect("construct");
    let next = cache.method(COUNTER, "next").expect("next");
    let id = counter
        .with_call(&cache, next, ReturnKind::Long, &[])
        .and_then(|r| r.into_long("next"))
        .expect("next after translated exception");
    assert_eq!(id, 1);

    drop(counter);
    let stats = sim.stats();
    assert_eq!(stats.live_locals, 0);
    assert_clean(&stats);
}

#[test]
fn translator_is_silent_without_pending_exception() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");
    assert_eq!(cache.translator().check_and_clear(), Ok(()));
}

#[test]
fn null_message_falls_back_to_unreadable() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");
    let counter = OwningHandle::construct(&cache, COUNTER, &[]).expect("construct");
    let mute = cache.method(COUNTER, "mute").expect("mute");

    let err = counter
        .with_call(&cache, mute, ReturnKind::Void, &[])
        .err()
        .expect("mute throws");
    assert_eq!(err, BridgeError::Foreign(ForeignError::Unreadable));
    assert!(!sim.exception_pending());
}

#[test]
fn nested_exception_during_extraction_falls_back() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");
    let counter = OwningHandle::construct(&cache, COUNTER, &[]).expect("construct");
    let poisoned = cache.method(COUNTER, "poisoned").expect("poisoned");

    let err = counter
        .with_call(&cache, poisoned, ReturnKind::Void, &[])
        .err()
        .expect("poisoned throws");
    assert_eq!(err, BridgeError::Foreign(ForeignError::Unreadable));
    assert!(!sim.exception_pending(), "nested exception must be cleared too");

    drop(counter);
    let stats = sim.stats();
    assert_eq!(stats.live_locals, 0);
    assert_clean(&stats);
}

// ─────────────────────────────────────────────────────────────
// Owning handle
// ─────────────────────────────────────────────────────────────

#[test]
fn release_is_idempotent() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");

    let mut counter = OwningHandle::construct(&cache, COUNTER, &[])
        .and_then(OwningHandle::into_durable)
        .expect("durable counter");
    assert_eq!(counter.scope(), Scope::Durable);
    assert_eq!(sim.stats().live_globals, 1);
    assert_eq!(sim.stats().live_locals, 0, "local deleted after promotion");

    counter.release();
    counter.release();
    assert!(counter.is_released());
    assert!(matches!(counter.get(), Err(BridgeError::Released)));

    let next = cache.method(COUNTER, "next").expect("next");
    assert!(matches!(
        counter.with_call(&cache, next, ReturnKind::Long, &[]),
        Err(BridgeError::Released)
    ));

    drop(counter);
    let stats = sim.stats();
    assert_eq!(stats.live_globals, 0);
    assert_clean(&stats);
}

#[test]
fn drop_releases_unreleased_handles() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");
    {
        let _local = OwningHandle::construct(&cache, COUNTER, &[]).expect("local");
        let _durable = OwningHandle::construct(&cache, COUNTER, &[])
            .and_then(OwningHandle::into_durable)
            .expect("durable");
        let stats = sim.stats();
        assert_eq!((stats.live_locals, stats.live_globals), (1, 1));
    }
    let stats = sim.stats();
    assert_eq!((stats.live_locals, stats.live_globals), (0, 0));
    assert_clean(&stats);
}

#[test]
fn raw_value_is_discarded_when_call_raises() {
    let sim = counter_runtime();
    sim.return_object_on_throw(true);
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");
    let counter = OwningHandle::construct(&cache, COUNTER, &[]).expect("construct");
    let fail = cache.method(COUNTER, "fail").expect("fail");

    let before = sim.stats().live_locals;
    let err = counter
        .with_call(&cache, fail, ReturnKind::Object, &[])
        .err()
        .expect("fail throws");
    assert_eq!(err.to_string(), "counter exploded");
    assert_eq!(
        sim.stats().live_locals,
        before,
        "reference returned alongside the exception must be deleted"
    );
    assert_clean(&sim.stats());
}

#[test]
fn static_fields_read_as_call_scoped_handles() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");
    let origin = OwningHandle::read_static(&cache, COUNTER, "ORIGIN").expect("ORIGIN");
    assert_eq!(origin.scope(), Scope::CallScoped);

    let next = cache.method(COUNTER, "next").expect("next");
    let value = origin
        .with_call(&cache, next, ReturnKind::Long, &[])
        .and_then(|r| r.into_long("next"))
        .expect("next on ORIGIN");
    assert_eq!(value, 101);
}

#[test]
fn unexpected_return_kind_is_an_error() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");
    let counter = OwningHandle::construct(&cache, COUNTER, &[]).expect("construct");
    let next = cache.method(COUNTER, "next").expect("next");

    let returned = counter
        .with_call(&cache, next, ReturnKind::Long, &[])
        .expect("next");
    assert!(matches!(
        returned.into_object("next"),
        Err(BridgeError::UnexpectedReturn { .. })
    ));
}

// ─────────────────────────────────────────────────────────────
// Buffer marshaler
// ─────────────────────────────────────────────────────────────

#[test]
fn marshaled_buffer_is_visible_to_the_runtime() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");
    let counter = OwningHandle::construct(&cache, COUNTER, &[]).expect("construct");
    let length = cache.method(COUNTER, "length").expect("length");

    let payloads: [&[u8]; 3] = [b"", b"hello", &[0u8; 4096]];
    for payload in payloads {
        let buffer = marshal::to_foreign(&cache, payload).expect("to_foreign");
        let len = counter
            .with_call(&cache, length, ReturnKind::Int, &[Arg::Object(buffer.get().unwrap())])
            .and_then(|r| r.into_int("length"))
            .expect("length");
        assert_eq!(len as usize, payload.len());
        assert_eq!(marshal::from_foreign(&cache, &buffer).expect("from_foreign"), payload);
    }

    drop(counter);
    let stats = sim.stats();
    assert_eq!(stats.live_locals, 0);
    assert_clean(&stats);
}

#[test]
fn zero_length_buffer_is_not_null() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");
    let buffer = marshal::to_foreign(&cache, &[]).expect("empty buffer");
    assert!(buffer.get().is_ok());
    assert_eq!(sim.byte_array_len(buffer.get().unwrap()), Some(0));
    assert_eq!(sim.stats().pins, 0, "nothing to copy, nothing pinned");
}

#[test]
fn allocation_failure_is_translated() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");
    sim.fail_allocations(true);

    let err = marshal::to_foreign(&cache, b"hello").err().expect("must fail");
    assert_eq!(err.to_string(), "Java heap space");
    assert!(!sim.exception_pending());
    assert_clean(&sim.stats());
}

#[test]
fn strings_cross_the_boundary() {
    let sim = counter_runtime();
    let cache = DescriptorCache::resolve(&sim, &[COUNTER_SPEC]).expect("resolve");
    let text = marshal::string_to_foreign(&cache, "zk+hierarchical://localhost:2181/ledgers")
        .expect("string");
    assert_eq!(
        sim.read_string(text.get().unwrap()).as_deref(),
        Some("zk+hierarchical://localhost:2181/ledgers")
    );
}

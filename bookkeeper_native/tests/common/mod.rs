//! A fake BookKeeper cluster registered on the in-process runtime.
//!
//! Mirrors the foreign behaviour the facade relies on: configuration
//! setters return `this`, the client constructor rejects URIs it cannot
//! parse, `createLedger` needs `ensemble_size` bookies, entry ids start
//! at 0 per ledger and `append` on a closed ledger throws.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use bookkeeper_native::descriptors::{
    ABSTRACT_CONFIGURATION, BOOKKEEPER, CLIENT_CONFIGURATION, DIGEST_TYPE, LEDGER_HANDLE,
};
use jvm_bridge::sim::{
    ClassDef, ObjectId, SimArg, SimContext, SimRuntime, SimStats, SimValue, Thrown,
};

const DIGEST_SIG: &str = "Lorg/apache/bookkeeper/client/BookKeeper$DigestType;";

/// Observable cluster state plus failure injection knobs.
#[derive(Debug, Default)]
pub struct ClusterState {
    pub bookies: i32,
    pub next_ledger_id: i64,
    pub ledgers_created: usize,
    pub ledgers_closed: usize,
    pub clients_opened: usize,
    pub clients_closed: usize,
    pub digests_used: Vec<String>,
    pub passwords: Vec<Vec<u8>>,
    /// Appended payloads, across all ledgers.
    pub entries: Vec<Vec<u8>>,
    pub append_attempts: usize,
    /// Zero-based append attempts that throw.
    pub fail_appends: BTreeSet<usize>,
    pub fail_ledger_close: bool,
    pub fail_client_close: bool,
}

pub struct FakeCluster {
    pub sim: SimRuntime,
    pub state: Rc<RefCell<ClusterState>>,
}

impl FakeCluster {
    pub fn new(bookies: i32) -> Self {
        Self::build(bookies, true)
    }

    /// A cluster whose runtime never had the `BookKeeper` class loaded.
    pub fn without_client_class() -> Self {
        Self::build(3, false)
    }

    pub fn stats(&self) -> SimStats {
        self.sim.stats()
    }

    pub fn state(&self) -> std::cell::Ref<'_, ClusterState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> std::cell::RefMut<'_, ClusterState> {
        self.state.borrow_mut()
    }

    fn build(bookies: i32, with_client: bool) -> Self {
        let sim = SimRuntime::new();
        let state = Rc::new(RefCell::new(ClusterState {
            bookies,
            ..ClusterState::default()
        }));

        sim.define(ClassDef::new(ABSTRACT_CONFIGURATION));
        sim.define(configuration_class());
        sim.define(digest_class());
        sim.define(ledger_class(&state));
        if with_client {
            sim.define(client_class(&state));
        }
        Self { sim, state }
    }
}

#[derive(Default)]
struct Configuration {
    metadata_service_uri: Option<String>,
}

struct DigestConstant(&'static str);

struct BookKeeperClient {
    closed: bool,
}

struct Ledger {
    id: i64,
    next_entry: i64,
    closed: bool,
}

fn configuration_class() -> ClassDef {
    ClassDef::new(CLIENT_CONFIGURATION)
        .constructor("()V", |_, _| Ok(Box::new(Configuration::default())))
        .method(
            "setMetadataServiceUri",
            "(Ljava/lang/String;)Lorg/apache/bookkeeper/conf/AbstractConfiguration;",
            |ctx, this, args| {
                let uri = string_arg(ctx, args, 0)?;
                let conf = ctx
                    .state::<Configuration>(this)
                    .ok_or_else(|| class_cast("ClientConfiguration"))?;
                conf.metadata_service_uri = Some(uri);
                Ok(SimValue::Object(Some(this)))
            },
        )
}

fn digest_class() -> ClassDef {
    ["DUMMY", "CRC32", "CRC32C", "MAC"]
        .into_iter()
        .fold(ClassDef::new(DIGEST_TYPE), |class, name| {
            class.static_object(name, DIGEST_SIG, DigestConstant(name))
        })
}

fn client_class(cluster: &Rc<RefCell<ClusterState>>) -> ClassDef {
    let on_open = Rc::clone(cluster);
    let on_create = Rc::clone(cluster);
    let on_close = Rc::clone(cluster);

    ClassDef::new(BOOKKEEPER)
        .constructor(
            "(Lorg/apache/bookkeeper/conf/ClientConfiguration;)V",
            move |ctx, args| {
                let conf = object_arg(args, 0)?;
                let uri = ctx
                    .state::<Configuration>(conf)
                    .ok_or_else(|| class_cast("ClientConfiguration"))?
                    .metadata_service_uri
                    .clone()
                    .unwrap_or_default();
                if !uri.starts_with("zk+hierarchical://") && !uri.starts_with("zk://") {
                    return Err(Thrown::new(
                        "java/lang/IllegalArgumentException",
                        format!("Invalid metadata service uri : {uri}"),
                    ));
                }
                on_open.borrow_mut().clients_opened += 1;
                Ok(Box::new(BookKeeperClient { closed: false }))
            },
        )
        .method(
            "createLedger",
            "(IILorg/apache/bookkeeper/client/BookKeeper$DigestType;[B)Lorg/apache/bookkeeper/client/LedgerHandle;",
            move |ctx, this, args| {
                let client = ctx
                    .state::<BookKeeperClient>(this)
                    .ok_or_else(|| class_cast("BookKeeper"))?;
                if client.closed {
                    return Err(Thrown::new(
                        "org/apache/bookkeeper/client/BKException$BKClientClosedException",
                        "BookKeeper client is closed",
                    ));
                }
                let ensemble = args.first().and_then(SimArg::as_int).unwrap_or(0);
                let quorum = args.get(1).and_then(SimArg::as_int).unwrap_or(0);
                let digest = object_arg(args, 2)?;
                let digest = ctx
                    .state::<DigestConstant>(digest)
                    .ok_or_else(|| class_cast("DigestType"))?
                    .0;
                let password = object_arg(args, 3)
                    .ok()
                    .and_then(|p| ctx.bytes(p))
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| null_pointer("password"))?;

                let mut cluster = on_create.borrow_mut();
                if quorum > ensemble {
                    return Err(Thrown::new(
                        "java/lang/IllegalArgumentException",
                        "Write quorum must be less or equal than ensemble size",
                    ));
                }
                if ensemble > cluster.bookies {
                    return Err(Thrown::new(
                        "org/apache/bookkeeper/client/BKException$BKNotEnoughBookiesException",
                        "Not enough non-faulty bookies available",
                    ));
                }
                let id = cluster.next_ledger_id;
                cluster.next_ledger_id += 1;
                cluster.ledgers_created += 1;
                cluster.digests_used.push(digest.to_string());
                cluster.passwords.push(password);

                let ledger = ctx.new_object(
                    LEDGER_HANDLE,
                    Ledger {
                        id,
                        next_entry: 0,
                        closed: false,
                    },
                );
                Ok(SimValue::Object(Some(ledger)))
            },
        )
        .method("close", "()V", move |ctx, this, _| {
            let client = ctx
                .state::<BookKeeperClient>(this)
                .ok_or_else(|| class_cast("BookKeeper"))?;
            client.closed = true;
            let mut cluster = on_close.borrow_mut();
            cluster.clients_closed += 1;
            if cluster.fail_client_close {
                return Err(Thrown::new(
                    "java/lang/InterruptedException",
                    "interrupted while closing",
                ));
            }
            Ok(SimValue::Void)
        })
}

fn ledger_class(cluster: &Rc<RefCell<ClusterState>>) -> ClassDef {
    let on_append = Rc::clone(cluster);
    let on_close = Rc::clone(cluster);

    ClassDef::new(LEDGER_HANDLE)
        .method("append", "([B)J", move |ctx, this, args| {
            let payload = object_arg(args, 0)
                .ok()
                .and_then(|p| ctx.bytes(p))
                .map(<[u8]>::to_vec)
                .ok_or_else(|| null_pointer("data"))?;

            let mut cluster = on_append.borrow_mut();
            let attempt = cluster.append_attempts;
            cluster.append_attempts += 1;

            let ledger = ctx
                .state::<Ledger>(this)
                .ok_or_else(|| class_cast("LedgerHandle"))?;
            if ledger.closed {
                return Err(Thrown::new(
                    "org/apache/bookkeeper/client/BKException$BKLedgerClosedException",
                    "Attempt to write to a closed ledger",
                ));
            }
            if cluster.fail_appends.contains(&attempt) {
                return Err(Thrown::new(
                    "org/apache/bookkeeper/client/BKException$BKNotEnoughBookiesException",
                    "Not enough non-faulty bookies available",
                ));
            }
            let entry_id = ledger.next_entry;
            ledger.next_entry += 1;
            cluster.entries.push(payload);
            Ok(SimValue::Long(entry_id))
        })
        .method("getId", "()J", |ctx, this, _| {
            let ledger = ctx
                .state::<Ledger>(this)
                .ok_or_else(|| class_cast("LedgerHandle"))?;
            Ok(SimValue::Long(ledger.id))
        })
        .method("close", "()V", move |ctx, this, _| {
            let ledger = ctx
                .state::<Ledger>(this)
                .ok_or_else(|| class_cast("LedgerHandle"))?;
            ledger.closed = true;
            let mut cluster = on_close.borrow_mut();
            cluster.ledgers_closed += 1;
            if cluster.fail_ledger_close {
                return Err(Thrown::new(
                    "org/apache/bookkeeper/client/BKException$BKLedgerRecoveryException",
                    "Error while recovering ledger",
                ));
            }
            Ok(SimValue::Void)
        })
}

fn object_arg(args: &[SimArg], index: usize) -> Result<ObjectId, Thrown> {
    args.get(index)
        .and_then(SimArg::as_object)
        .ok_or_else(|| null_pointer("argument"))
}

fn string_arg(ctx: &SimContext<'_>, args: &[SimArg], index: usize) -> Result<String, Thrown> {
    let id = object_arg(args, index)?;
    ctx.string(id)
        .map(str::to_string)
        .ok_or_else(|| class_cast("String"))
}

fn class_cast(expected: &str) -> Thrown {
    Thrown::new("java/lang/ClassCastException", format!("expected {expected}"))
}

fn null_pointer(what: &str) -> Thrown {
    Thrown::new("java/lang/NullPointerException", format!("{what} is null"))
}

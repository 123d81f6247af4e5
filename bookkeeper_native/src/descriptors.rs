//! The BookKeeper classes and members this crate calls, with their JVM
//! signatures. Resolved once at startup by `DescriptorCache::resolve`.

use jvm_bridge::{MemberSpec, TypeSpec};

pub const ABSTRACT_CONFIGURATION: &str = "org/apache/bookkeeper/conf/AbstractConfiguration";
pub const CLIENT_CONFIGURATION: &str = "org/apache/bookkeeper/conf/ClientConfiguration";
pub const BOOKKEEPER: &str = "org/apache/bookkeeper/client/BookKeeper";
pub const LEDGER_HANDLE: &str = "org/apache/bookkeeper/client/LedgerHandle";
pub const DIGEST_TYPE: &str = "org/apache/bookkeeper/client/BookKeeper$DigestType";

pub const SET_METADATA_SERVICE_URI: &str = "setMetadataServiceUri";
pub const CREATE_LEDGER: &str = "createLedger";
pub const APPEND: &str = "append";
pub const GET_ID: &str = "getId";
pub const CLOSE: &str = "close";

const DIGEST_TYPE_SIG: &str = "Lorg/apache/bookkeeper/client/BookKeeper$DigestType;";

/// Every type the facade touches.
pub const BOOKKEEPER_TYPES: &[TypeSpec] = &[
    TypeSpec {
        name: ABSTRACT_CONFIGURATION,
        members: &[],
    },
    TypeSpec {
        name: CLIENT_CONFIGURATION,
        members: &[
            MemberSpec::constructor("()V"),
            MemberSpec::method(
                SET_METADATA_SERVICE_URI,
                "(Ljava/lang/String;)Lorg/apache/bookkeeper/conf/AbstractConfiguration;",
            ),
        ],
    },
    TypeSpec {
        name: DIGEST_TYPE,
        members: &[
            MemberSpec::static_field("DUMMY", DIGEST_TYPE_SIG),
            MemberSpec::static_field("CRC32", DIGEST_TYPE_SIG),
            MemberSpec::static_field("CRC32C", DIGEST_TYPE_SIG),
            MemberSpec::static_field("MAC", DIGEST_TYPE_SIG),
        ],
    },
    TypeSpec {
        name: LEDGER_HANDLE,
        members: &[
            MemberSpec::method(APPEND, "([B)J"),
            MemberSpec::method(GET_ID, "()J"),
            MemberSpec::method(CLOSE, "()V"),
        ],
    },
    TypeSpec {
        name: BOOKKEEPER,
        members: &[
            MemberSpec::constructor("(Lorg/apache/bookkeeper/conf/ClientConfiguration;)V"),
            MemberSpec::method(
                CREATE_LEDGER,
                "(IILorg/apache/bookkeeper/client/BookKeeper$DigestType;[B)Lorg/apache/bookkeeper/client/LedgerHandle;",
            ),
            MemberSpec::method(CLOSE, "()V"),
        ],
    },
];

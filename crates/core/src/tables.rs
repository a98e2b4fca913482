//! Hand-maintained tables consulted by label construction, flattening and
//! augmentation. Bump `emit::EMISSION_SALT` when a change here should force
//! every rule file to be rewritten.

/// Headers every IDL-generated translation unit includes.
pub const IDL_RUNTIME_SEEDS: &[&str] = &[
    "mongo/base/data_range.h",
    "mongo/base/string_data.h",
    "mongo/bson/bsonobj.h",
    "mongo/bson/bsonobjbuilder.h",
    "mongo/bson/simple_bsonobj_comparator.h",
    "mongo/db/auth/authorization_contract.h",
    "mongo/db/namespace_string.h",
    "mongo/idl/basic_types_gen.h",
    "mongo/idl/idl_parser.h",
    "mongo/rpc/op_msg.h",
    "mongo/stdx/unordered_map.h",
    "mongo/util/decimal_counter.h",
    "mongo/util/serialization_context.h",
    "mongo/util/uuid.h",
];

/// Right paths that never produce an edge.
pub const EXCLUDED_RIGHT: &[&str] = &[
    "mongo/platform/windows_basic.h",
    "mongo/util/net/ssl_manager_apple.h",
    "mongo/util/net/ssl_manager_windows.h",
];

/// Generated headers owned by hand-written generator targets.
pub const GENERATED_HEADER_REMAP: &[(&str, &str)] = &[
    ("mongo/base/error_codes.h", "//src/mongo/base:error_codes_header"),
    ("mongo/config.h", "//src/mongo:mongo_config_header"),
    (
        "mongo/util/version_constants.h",
        "//src/mongo/util:version_constants_header",
    ),
];

/// Synthetic edges for generated sources the include scan cannot see.
pub const GENERATED_LEFT: &[(&str, &[&str])] = &[
    (
        "mongo/util/version_constants_gen",
        &["mongo/base/string_data.h", "mongo/util/version.h"],
    ),
    (
        "mongo/db/feature_flag_gen",
        &["mongo/db/feature_flag.h", "mongo/idl/basic_types_gen.h"],
    ),
    (
        "mongo/shell/mongo_js_gen",
        &["mongo/base/string_data.h", "mongo/scripting/engine.h"],
    ),
];

/// Module whose packages may also be seen by one sibling module.
pub const MODULE_VISIBILITY_EXCEPTION: (&str, &str) = ("enterprise", "atlas");

pub fn is_excluded(path: &str) -> bool {
    EXCLUDED_RIGHT.contains(&path)
}

pub fn remapped_label(path: &str) -> Option<&'static str> {
    GENERATED_HEADER_REMAP
        .iter()
        .find(|(from, _)| *from == path)
        .map(|(_, label)| *label)
}

//! Preload type generation
//!
//! Developer-time step that keeps the UI process's typed client in sync
//! with the registered routes. It produces two artifacts:
//!
//! - a TypeScript declaration file: one `declare namespace` per source
//!   module holding that module's schema types, an `Args`/`Result` alias
//!   pair per channel, and an `IpcApi` interface mirroring the namespace
//!   tree where every leaf is a typed callable;
//! - the plain namespace tree as JSON, read at runtime by the UI process to
//!   know which nested calls exist.
//!
//! Output is fully deterministic (everything is iterated in sorted order),
//! and each run overwrites both files in full.

use crate::channel::RouteDescriptor;
use crate::error::GeneratorError;
use crate::namespace::{NamespaceNode, NamespaceTree};
use crate::schema::{property_key, ModuleSchema, SchemaPair, SchemaResolution};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Conventional location of the declaration file, relative to the project root
pub const DEFAULT_TYPES_PATH: &str = "src/preload/ipc-api.generated.d.ts";

/// Conventional location of the namespace JSON, relative to the project root
pub const DEFAULT_TREE_PATH: &str = "src/preload/ipc-namespace.generated.json";

const HEADER: &str = "// Generated by ipc-router. Do not edit by hand.\n\
\n\
export type IpcCall<Args, Result> = (args: Args) => Promise<Result>;\n\
export type IpcAnyCall = (...args: unknown[]) => Promise<unknown>;\n";

lazy_static::lazy_static! {
    static ref NON_ALNUM_RE: Regex = Regex::new(r"[^A-Za-z0-9]").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub types_path: PathBuf,
    pub tree_path: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            types_path: PathBuf::from(DEFAULT_TYPES_PATH),
            tree_path: PathBuf::from(DEFAULT_TREE_PATH),
        }
    }
}

impl GeneratorConfig {
    /// Conventional paths under a project root
    pub fn under(root: &Path) -> Self {
        Self {
            types_path: root.join(DEFAULT_TYPES_PATH),
            tree_path: root.join(DEFAULT_TREE_PATH),
        }
    }
}

/// Rendered artifacts, not yet written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadArtifacts {
    pub declarations: String,
    pub namespace_json: String,
}

/// Where the artifacts were written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifacts {
    pub types_path: PathBuf,
    pub tree_path: PathBuf,
}

/// Type names generated for one channel
struct ChannelTypes {
    args: String,
    result: String,
    typed: bool,
}

/// Render both artifacts for a route set
pub fn render(tree: &NamespaceTree, routes: &[(&RouteDescriptor, &ModuleSchema)]) -> PreloadArtifacts {
    let schemas: BTreeMap<&str, &ModuleSchema> = routes
        .iter()
        .map(|(descriptor, schema)| (descriptor.source_module.as_str(), *schema))
        .collect();
    let aliases = module_aliases(schemas.keys().copied());
    let op_members: BTreeMap<&str, BTreeMap<&str, String>> = schemas
        .iter()
        .filter_map(|(module, schema)| match schema {
            ModuleSchema::PerOperation(ops) => Some((*module, operation_members(ops))),
            _ => None,
        })
        .collect();

    let mut out = String::from(HEADER);

    for (module, alias) in &aliases {
        if let Some(block) = render_module(alias, schemas[module], op_members.get(module)) {
            out.push('\n');
            out.push_str(&block);
        }
    }

    let mut sorted: Vec<_> = routes.to_vec();
    sorted.sort_by(|a, b| a.0.channel.cmp(&b.0.channel));

    let mut channel_types = BTreeMap::new();
    let mut used_names = BTreeSet::new();
    if !sorted.is_empty() {
        out.push('\n');
    }
    for (descriptor, schema) in sorted {
        let base = unique_name(pascal_case(descriptor.channel.as_str()), &mut used_names);
        let alias = &aliases[descriptor.source_module.as_str()];
        let (args_ref, result_ref, typed) = match schema.resolve(&descriptor.operation) {
            SchemaResolution::Operation(_) => {
                let op = op_members
                    .get(descriptor.source_module.as_str())
                    .and_then(|members| members.get(descriptor.operation.as_str()))
                    .cloned()
                    .unwrap_or_else(|| pascal_case(&descriptor.operation));
                (format!("{}.{}Args", alias, op), format!("{}.{}Result", alias, op), true)
            }
            SchemaResolution::Shared(_) => (format!("{}.Args", alias), format!("{}.Result", alias), true),
            SchemaResolution::Unconstrained => ("unknown".to_string(), "unknown".to_string(), false),
        };

        let types = ChannelTypes {
            args: format!("{}Args", base),
            result: format!("{}Result", base),
            typed,
        };
        out.push_str(&format!("export type {} = {};\n", types.args, args_ref));
        out.push_str(&format!("export type {} = {};\n", types.result, result_ref));
        channel_types.insert(descriptor.channel.to_string(), types);
    }

    out.push('\n');
    out.push_str("export interface IpcApi ");
    render_members(tree.children(), "", 0, &channel_types, &mut out);
    out.push('\n');

    let namespace_json = serde_json::to_string_pretty(tree)
        .map(|json| json + "\n")
        .unwrap_or_else(|_| "{}\n".to_string());

    PreloadArtifacts {
        declarations: out,
        namespace_json,
    }
}

/// Write both artifacts, replacing any previous content
pub fn write_artifacts(
    config: &GeneratorConfig,
    artifacts: &PreloadArtifacts,
) -> Result<GeneratedArtifacts, GeneratorError> {
    write_file(&config.types_path, &artifacts.declarations)?;
    write_file(&config.tree_path, &artifacts.namespace_json)?;

    tracing::info!(
        op = "ipc.generate.complete",
        types_path = %config.types_path.display(),
        tree_path = %config.tree_path.display(),
        "Preload types generated"
    );

    Ok(GeneratedArtifacts {
        types_path: config.types_path.clone(),
        tree_path: config.tree_path.clone(),
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), GeneratorError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| GeneratorError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| GeneratorError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Collision-free namespace alias per module, e.g. `routes/auth` → `M_routes_auth`
fn module_aliases<'a>(modules: impl Iterator<Item = &'a str>) -> BTreeMap<&'a str, String> {
    let mut used = BTreeSet::new();
    modules
        .map(|module| {
            let base = format!("M_{}", NON_ALNUM_RE.replace_all(module, "_"));
            (module, unique_name(base, &mut used))
        })
        .collect()
}

fn unique_name(base: String, used: &mut BTreeSet<String>) -> String {
    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{}_{}", base, n);
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn pascal_case(raw: &str) -> String {
    let mut out = String::new();
    for part in raw.split(|c: char| !c.is_ascii_alphanumeric()).filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "Op");
    }
    out
}

/// Collision-free type member name per operation of one module
fn operation_members(ops: &BTreeMap<String, SchemaPair>) -> BTreeMap<&str, String> {
    let mut used = BTreeSet::new();
    ops.keys()
        .map(|op| (op.as_str(), unique_name(pascal_case(op), &mut used)))
        .collect()
}

fn render_module(
    alias: &str,
    schema: &ModuleSchema,
    op_members: Option<&BTreeMap<&str, String>>,
) -> Option<String> {
    let members: Vec<(String, String)> = match schema {
        ModuleSchema::PerOperation(ops) => ops
            .iter()
            .flat_map(|(op, pair)| {
                let op = op_members
                    .and_then(|members| members.get(op.as_str()))
                    .cloned()
                    .unwrap_or_else(|| pascal_case(op));
                [
                    (format!("{}Args", op), pair.args.to_typescript()),
                    (format!("{}Result", op), pair.result.to_typescript()),
                ]
            })
            .collect(),
        ModuleSchema::Single(pair) => vec![
            ("Args".to_string(), pair.args.to_typescript()),
            ("Result".to_string(), pair.result.to_typescript()),
        ],
        ModuleSchema::None => return None,
    };

    let mut block = format!("declare namespace {} {{\n", alias);
    for (name, ty) in members {
        block.push_str(&format!("  export type {} = {};\n", name, ty));
    }
    block.push_str("}\n");
    Some(block)
}

fn render_members<'a>(
    children: impl Iterator<Item = (&'a str, &'a NamespaceNode)>,
    path: &str,
    depth: usize,
    types: &BTreeMap<String, ChannelTypes>,
    out: &mut String,
) {
    let indent = "  ".repeat(depth + 1);
    out.push_str("{\n");

    for (segment, node) in children {
        let channel = if path.is_empty() {
            segment.to_string()
        } else {
            format!("{}:{}", path, segment)
        };

        out.push_str(&indent);
        out.push_str(&property_key(segment));
        out.push_str(": ");

        if node.is_leaf() {
            match types.get(&channel) {
                Some(t) if t.typed => out.push_str(&format!("IpcCall<{}, {}>", t.args, t.result)),
                _ => out.push_str("IpcAnyCall"),
            }
        } else {
            render_members(node.children(), &channel, depth + 1, types, out);
        }
        out.push_str(";\n");
    }

    out.push_str(&"  ".repeat(depth));
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{handler_fn, BoxedHandler};
    use crate::registry::IpcRouter;
    use crate::schema::{Field, SchemaPair, TypeSchema};
    use crate::transport::MemoryTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn noop() -> BoxedHandler {
        handler_fn(|_, _| async { Ok(serde_json::Value::Null) })
    }

    fn d(channel: &str) -> RouteDescriptor {
        RouteDescriptor::from_channel(channel).unwrap()
    }

    fn auth_schema() -> ModuleSchema {
        ModuleSchema::per_operation([(
            "login",
            SchemaPair::new(
                TypeSchema::object([
                    Field::required("username", TypeSchema::String),
                    Field::required("password", TypeSchema::String),
                ]),
                TypeSchema::object([Field::required("token", TypeSchema::String)]),
            ),
        )])
    }

    fn ipc_schema() -> ModuleSchema {
        ModuleSchema::Single(SchemaPair::new(
            TypeSchema::Null,
            TypeSchema::record(TypeSchema::Unknown),
        ))
    }

    fn sample_router() -> IpcRouter {
        let mut router = IpcRouter::new(Arc::new(MemoryTransport::new()));
        router.register(d("app:ping"), &[], noop()).unwrap();
        router
            .register_with_schema(d("auth:login"), auth_schema(), &[], noop())
            .unwrap();
        router
            .register_with_schema(d("auth:logout"), auth_schema(), &[], noop())
            .unwrap();
        router
            .register_with_schema(d("ipc:namespace"), ipc_schema(), &[], noop())
            .unwrap();
        router
    }

    #[test]
    fn test_render_full_declaration_file() {
        let artifacts = sample_router().render_preload_types();
        let expected = "\
// Generated by ipc-router. Do not edit by hand.

export type IpcCall<Args, Result> = (args: Args) => Promise<Result>;
export type IpcAnyCall = (...args: unknown[]) => Promise<unknown>;

declare namespace M_routes_auth {
  export type LoginArgs = { username: string; password: string };
  export type LoginResult = { token: string };
}

declare namespace M_routes_ipc {
  export type Args = null;
  export type Result = Record<string, unknown>;
}

export type AppPingArgs = unknown;
export type AppPingResult = unknown;
export type AuthLoginArgs = M_routes_auth.LoginArgs;
export type AuthLoginResult = M_routes_auth.LoginResult;
export type AuthLogoutArgs = unknown;
export type AuthLogoutResult = unknown;
export type IpcNamespaceArgs = M_routes_ipc.Args;
export type IpcNamespaceResult = M_routes_ipc.Result;

export interface IpcApi {
  app: {
    ping: IpcAnyCall;
  };
  auth: {
    login: IpcCall<AuthLoginArgs, AuthLoginResult>;
    logout: IpcAnyCall;
  };
  ipc: {
    namespace: IpcCall<IpcNamespaceArgs, IpcNamespaceResult>;
  };
}
";
        assert_eq!(artifacts.declarations, expected);

        let tree: serde_json::Value = serde_json::from_str(&artifacts.namespace_json).unwrap();
        assert_eq!(
            tree,
            json!({ "app": { "ping": true }, "auth": { "login": true, "logout": true }, "ipc": { "namespace": true } })
        );
    }

    #[test]
    fn test_per_operation_schema_yields_per_operation_aliases() {
        let mut router = IpcRouter::new(Arc::new(MemoryTransport::new()));
        let schema = ModuleSchema::per_operation([
            ("list", SchemaPair::new(TypeSchema::Null, TypeSchema::array(TypeSchema::String))),
            ("get", SchemaPair::new(TypeSchema::String, TypeSchema::String)),
        ]);
        router
            .register_with_schema(d("query:pegawai:list"), schema.clone(), &[], noop())
            .unwrap();
        router
            .register_with_schema(d("query:pegawai:get"), schema, &[], noop())
            .unwrap();

        let out = router.render_preload_types().declarations;
        assert!(out.contains("export type QueryPegawaiListArgs = M_routes_query_pegawai.ListArgs;"));
        assert!(out.contains("export type QueryPegawaiGetResult = M_routes_query_pegawai.GetResult;"));
        assert!(out.contains("  export type ListResult = Array<string>;"));
        assert!(out.contains("list: IpcCall<QueryPegawaiListArgs, QueryPegawaiListResult>;"));
    }

    #[test]
    fn test_single_schema_is_shared_by_every_channel() {
        let mut router = IpcRouter::new(Arc::new(MemoryTransport::new()));
        let schema = ModuleSchema::Single(SchemaPair::new(TypeSchema::String, TypeSchema::Boolean));
        router
            .register_with_schema(d("cppt:save"), schema.clone(), &[], noop())
            .unwrap();
        router
            .register_with_schema(d("cppt:draft"), schema, &[], noop())
            .unwrap();

        let out = router.render_preload_types().declarations;
        assert_eq!(out.matches("declare namespace M_routes_cppt {").count(), 1);
        assert!(out.contains("export type CpptSaveArgs = M_routes_cppt.Args;"));
        assert!(out.contains("export type CpptDraftArgs = M_routes_cppt.Args;"));
        assert!(out.contains("export type CpptDraftResult = M_routes_cppt.Result;"));
    }

    #[test]
    fn test_missing_schema_falls_back_to_unknown() {
        let mut router = IpcRouter::new(Arc::new(MemoryTransport::new()));
        router.register(d("resep:print"), &[], noop()).unwrap();

        let out = router.render_preload_types().declarations;
        assert!(!out.contains("declare namespace"));
        assert!(out.contains("export type ResepPrintArgs = unknown;"));
        assert!(out.contains("export type ResepPrintResult = unknown;"));
        assert!(out.contains("print: IpcAnyCall;"));
    }

    #[test]
    fn test_operation_members_are_collision_free() {
        let mut router = IpcRouter::new(Arc::new(MemoryTransport::new()));
        let schema = ModuleSchema::per_operation([
            ("get-all", SchemaPair::new(TypeSchema::String, TypeSchema::String)),
            ("get_all", SchemaPair::new(TypeSchema::Number, TypeSchema::Number)),
        ]);
        router
            .register_with_schema(d("rm:get-all"), schema.clone(), &[], noop())
            .unwrap();
        router
            .register_with_schema(d("rm:get_all"), schema, &[], noop())
            .unwrap();

        let out = router.render_preload_types().declarations;
        assert_eq!(out.matches("export type GetAllArgs = ").count(), 1);
        assert!(out.contains("  export type GetAllArgs = string;"));
        assert!(out.contains("  export type GetAll_2Args = number;"));
        assert!(out.contains("export type RmGetAllArgs = M_routes_rm.GetAllArgs;"));
        assert!(out.contains("export type RmGetAll_2Args = M_routes_rm.GetAll_2Args;"));
    }

    #[test]
    fn test_aliases_are_collision_free() {
        let aliases = module_aliases(["routes/a-b", "routes/a_b", "routes/a.b"].into_iter());
        let values: BTreeSet<_> = aliases.values().cloned().collect();
        assert_eq!(values.len(), 3);
        assert!(values.contains("M_routes_a_b"));
        assert!(values.contains("M_routes_a_b_2"));
        assert!(values.contains("M_routes_a_b_3"));
        assert!(aliases.values().all(|a| a.starts_with("M_")));
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("query:pegawai:list"), "QueryPegawaiList");
        assert_eq!(pascal_case("rawat-inap:get_all"), "RawatInapGetAll");
        assert_eq!(pascal_case("2fa"), "Op2fa");
        assert_eq!(pascal_case(""), "Op");
    }

    #[test]
    fn test_generation_is_deterministic_on_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = GeneratorConfig::under(temp.path());
        let router = sample_router();

        router.generate_preload_types(&config).unwrap();
        let first_types = fs::read(&config.types_path).unwrap();
        let first_tree = fs::read(&config.tree_path).unwrap();

        let written = router.generate_preload_types(&config).unwrap();
        assert_eq!(written.types_path, config.types_path);
        assert_eq!(fs::read(&config.types_path).unwrap(), first_types);
        assert_eq!(fs::read(&config.tree_path).unwrap(), first_tree);
    }

    #[test]
    fn test_generation_overwrites_previous_output() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = GeneratorConfig::under(temp.path());
        fs::create_dir_all(config.tree_path.parent().unwrap()).unwrap();
        fs::write(&config.tree_path, "{\"stale\": {\"entry\": true}, \"padding\": \"xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx\"}").unwrap();

        sample_router().generate_preload_types(&config).unwrap();
        let tree: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&config.tree_path).unwrap()).unwrap();
        assert!(tree.get("stale").is_none());
        assert_eq!(tree["app"]["ping"], true);
    }

    #[test]
    fn test_write_failure_is_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        let blocker = temp.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();

        let config = GeneratorConfig {
            types_path: blocker.join("ipc.d.ts"),
            tree_path: temp.path().join("tree.json"),
        };
        let err = sample_router().generate_preload_types(&config).unwrap_err();
        assert!(matches!(err, GeneratorError::CreateDir { .. } | GeneratorError::Write { .. }));
        assert!(!config.tree_path.exists());
    }
}

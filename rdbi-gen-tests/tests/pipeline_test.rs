//! End-to-end generation tests
//!
//! Each test lays out a schema, templates and an output directory in a temp
//! dir, runs the generator against it and inspects the files it produced.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rdbi_gen::config::Settings;
use rdbi_gen::{Environ, GenError, GeneratorBuilder, PreviewFormat};
use tempfile::TempDir;

const SCHEMA_SQL: &str = r#"
CREATE TABLE users (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    email VARCHAR(255) NOT NULL,
    status ENUM('active', 'banned') NOT NULL,
    UNIQUE INDEX idx_users_email (email)
);

CREATE TABLE posts (
    id BIGINT NOT NULL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    title VARCHAR(200),
    CONSTRAINT fk_posts_user FOREIGN KEY (user_id) REFERENCES users (id)
);
"#;

const TABLE_TEMPLATE: &str = r#"// {{ params.banner }}
struct {{ table.name }} {
{%- for c in table.columns %}
    {{ c.name | snake }}: {{ c.type }},
{%- endfor %}
}
{% for fk in table.foreign_keys %}// fk {{ fk.db_name }} -> {{ fk.ref_table_db_name }}
{% endfor %}{% for fk in table.foreign_key_refs %}// ref {{ fk.db_name }} <- {{ fk.table_db_name }}
{% endfor %}"#;

const ENUM_TEMPLATE: &str =
    "enum {{ enum.name }} { {% for v in enum.values %}{{ v.name }} = {{ v.value }}, {% endfor %}}\n";

const SCHEMA_TEMPLATE: &str =
    "{% for t in schema.tables %}mod {{ t.name | snake }};\n{% endfor %}";

/// A project directory with a schema file and templates
struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let project = Self { dir };
        project.write("schema.sql", SCHEMA_SQL);
        project.write("templates/table.rs.tera", TABLE_TEMPLATE);
        project.write("templates/enum.rs.tera", ENUM_TEMPLATE);
        project.write("templates/mod.rs.tera", SCHEMA_TEMPLATE);
        project
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, relative: &str, contents: &str) {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn out(&self, relative: &str) -> PathBuf {
        self.root().join("out").join(relative)
    }

    fn read_out(&self, relative: &str) -> String {
        fs::read_to_string(self.out(relative))
            .unwrap_or_else(|e| panic!("reading {}: {}", relative, e))
    }

    /// Settings rendering tables, enums and the schema module
    fn settings(&self) -> Settings {
        let mut settings = Settings {
            conn_str: self.root().join("schema.sql").to_string_lossy().into_owned(),
            schemas: vec!["public".into()],
            name_conversion: "{{ name | pascal }}".into(),
            output_dir: "out".into(),
            template_dir: "templates".into(),
            type_map: HashMap::from([
                ("BIGINT".to_string(), "i64".to_string()),
                ("VARCHAR(255)".to_string(), "String".to_string()),
                ("enum".to_string(), "String".to_string()),
            ]),
            nullable_type_map: HashMap::from([(
                "VARCHAR(200)".to_string(),
                "Option<String>".to_string(),
            )]),
            ..Default::default()
        };
        settings
            .table_paths
            .insert("{{ table | snake }}.rs".into(), "table.rs.tera".into());
        settings.enum_paths.insert(
            "enums/{{ table }}_{{ enum | snake }}.rs".into(),
            "enum.rs.tera".into(),
        );
        settings
            .schema_paths
            .insert("{{ schema | snake }}/mod.rs".into(), "mod.rs.tera".into());
        settings
            .params
            .insert("banner".into(), "generated, do not edit".into());
        settings
    }

    fn builder(&self, settings: Settings) -> GeneratorBuilder {
        GeneratorBuilder::from_settings(settings, self.root()).environ(env())
    }
}

fn env() -> Environ {
    Environ::from_pairs([("PATH", std::env::var("PATH").unwrap_or_default())])
}

#[test]
fn test_generates_every_unit_kind() {
    let project = Project::new();
    let report = project.builder(project.settings()).generate().unwrap();

    assert_eq!(report.written.len(), 4);
    assert!(report.skipped.is_empty());

    let users = project.read_out("users.rs");
    assert!(users.starts_with("// generated, do not edit\nstruct Users {"));
    assert!(users.contains("    id: i64,\n    email: String,\n    status: String,\n}"));
    assert!(users.contains("// ref fk_posts_user <- posts"));

    let posts = project.read_out("posts.rs");
    assert!(posts.contains("    user_id: i64,\n    title: Option<String>,\n}"));
    assert!(posts.contains("// fk fk_posts_user -> users"));

    assert_eq!(
        project.read_out("enums/users_status.rs"),
        "enum Status { Active = 1, Banned = 2, }\n"
    );
    assert_eq!(project.read_out("public/mod.rs"), "mod users;\nmod posts;\n");
}

#[test]
fn test_units_are_generated_schema_then_enum_then_table() {
    let project = Project::new();
    let report = project.builder(project.settings()).generate().unwrap();

    let order: Vec<PathBuf> = ["public/mod.rs", "enums/users_status.rs", "users.rs", "posts.rs"]
        .iter()
        .map(|f| project.out(f))
        .collect();
    assert_eq!(report.written, order);
}

#[test]
fn test_unconfigured_kinds_are_skipped() {
    let project = Project::new();
    let mut settings = project.settings();
    settings.schema_paths.clear();
    settings.enum_paths.clear();

    let report = project.builder(settings).generate().unwrap();

    assert_eq!(
        report.written,
        vec![project.out("users.rs"), project.out("posts.rs")]
    );
    assert!(!project.out("public").exists());
    assert!(!project.out("enums").exists());
}

#[test]
fn test_second_run_is_byte_identical() {
    let project = Project::new();
    project.builder(project.settings()).generate().unwrap();
    let first = project.read_out("users.rs");

    project.builder(project.settings()).generate().unwrap();
    assert_eq!(project.read_out("users.rs"), first);
}

#[test]
fn test_no_overwrite_glob_keeps_existing_file() {
    let project = Project::new();
    let mut settings = project.settings();
    settings.no_overwrite_globs = vec!["users.rs".into()];

    // Nothing exists yet, so the protected file is still created
    let report = project.builder(settings.clone()).generate().unwrap();
    assert!(report.written.contains(&project.out("users.rs")));

    fs::write(project.out("users.rs"), "hand edited").unwrap();
    let report = project.builder(settings).generate().unwrap();

    assert_eq!(project.read_out("users.rs"), "hand edited");
    assert_eq!(report.skipped, vec![project.out("users.rs")]);
    assert!(report.written.contains(&project.out("posts.rs")));
}

#[test]
fn test_no_overwrite_glob_does_not_cross_directories() {
    let project = Project::new();
    let mut settings = project.settings();
    settings.no_overwrite_globs = vec!["*.rs".into()];

    project.builder(settings.clone()).generate().unwrap();
    fs::write(project.out("users.rs"), "hand edited").unwrap();
    fs::write(project.out("public/mod.rs"), "hand edited").unwrap();

    let report = project.builder(settings).generate().unwrap();

    assert_eq!(project.read_out("users.rs"), "hand edited");
    // `*` does not match the path separator in `public/mod.rs`
    assert_eq!(project.read_out("public/mod.rs"), "mod users;\nmod posts;\n");
    assert!(report.written.contains(&project.out("public/mod.rs")));
}

#[test]
fn test_include_tables_limits_units() {
    let project = Project::new();
    let mut settings = project.settings();
    settings.include_tables = vec!["posts".into()];

    let report = project.builder(settings).generate().unwrap();

    assert!(report.written.contains(&project.out("posts.rs")));
    assert!(!project.out("users.rs").exists());
    // The enum belonged to a filtered-out table
    assert!(!project.out("enums/users_status.rs").exists());
    // References to the filtered-out table are dropped, not fatal
    assert!(!project.read_out("posts.rs").contains("// fk"));
}

#[test]
fn test_static_files_are_copied() {
    let project = Project::new();
    project.write("static/README.md", "# generated models\n");
    project.write("static/nested/keep.txt", "keep");
    let mut settings = project.settings();
    settings.static_dir = Some("static".into());

    project.builder(settings).generate().unwrap();

    assert_eq!(project.read_out("README.md"), "# generated models\n");
    assert_eq!(project.read_out("nested/keep.txt"), "keep");
}

#[test]
fn test_output_dir_override() {
    let project = Project::new();
    let elsewhere = project.root().join("elsewhere");

    project
        .builder(project.settings())
        .output_dir(&elsewhere)
        .generate()
        .unwrap();

    assert!(elsewhere.join("users.rs").exists());
    assert!(!project.out("users.rs").exists());
}

#[test]
fn test_render_error_names_target_and_unit() {
    let project = Project::new();
    project.write("templates/table.rs.tera", "{{ table.no_such_field }}");

    let err = project.builder(project.settings()).generate().unwrap_err();
    let message = err.to_string();

    assert!(message.contains("{{ table | snake }}.rs"), "{}", message);
    assert!(message.contains("table public.users"), "{}", message);
    assert!(!project.out("users.rs").exists());
}

#[test]
fn test_template_parse_error_fails_before_reading_schema() {
    let project = Project::new();
    project.write("templates/table.rs.tera", "{% for c in %}");
    let mut settings = project.settings();
    settings.conn_str = project.root().join("missing.sql").to_string_lossy().into_owned();

    let err = project.builder(settings).generate().unwrap_err();

    assert!(
        matches!(err, GenError::TemplateParse { .. }),
        "unexpected error: {}",
        err
    );
    assert!(!project.out("").exists());
}

#[test]
fn test_unknown_driver_is_rejected() {
    let project = Project::new();
    let mut settings = project.settings();
    settings.db_type = "oracle".into();

    let err = project.builder(settings).generate().unwrap_err();
    assert!(matches!(err, GenError::UnknownDriver(ref name) if name == "oracle"));
}

#[test]
fn test_conn_str_expands_environment() {
    let project = Project::new();
    let mut settings = project.settings();
    settings.conn_str = "$SCHEMA_DIR/schema.sql".into();

    let env = env().with_var("SCHEMA_DIR", project.root().to_string_lossy());
    let report = GeneratorBuilder::from_settings(settings, project.root())
        .environ(env)
        .generate()
        .unwrap();

    assert_eq!(report.written.len(), 4);
}

#[test]
fn test_generate_from_config_file() {
    let project = Project::new();
    let config = format!(
        r#"
conn_str = "{schema}"
schemas = ["public"]
name_conversion = "{{{{ name | pascal }}}}"
output_dir = "out"
template_dir = "templates"

[table_paths]
"{{{{ table | snake }}}}.rs" = "table.rs.tera"

[params]
banner = "from file"

[type_map]
"BIGINT" = "i64"
"#,
        schema = project.root().join("schema.sql").display()
    );
    project.write("rdbi-gen.toml", &config);

    let report = rdbi_gen::generate(project.root().join("rdbi-gen.toml")).unwrap();

    assert_eq!(report.written.len(), 2);
    let users = project.read_out("users.rs");
    assert!(users.starts_with("// from file\n"));
    // Unmapped types render as the empty string
    assert!(users.contains("    email: ,\n"));
}

#[test]
fn test_snapshot_driver() {
    let project = Project::new();
    let snapshot = serde_json::json!({
        "schemas": [{
            "name": "public",
            "tables": [{
                "name": "tags",
                "columns": [
                    {"name": "id", "data_type": "BIGINT", "is_primary_key": true},
                    {"name": "label", "data_type": "VARCHAR(255)"}
                ]
            }]
        }]
    });
    project.write("schema.json", &snapshot.to_string());

    let mut settings = project.settings();
    settings.db_type = "json".into();
    settings.conn_str = project.root().join("schema.json").to_string_lossy().into_owned();
    settings.schema_paths.clear();

    let report = project.builder(settings).generate().unwrap();

    assert_eq!(report.written, vec![project.out("tags.rs")]);
    assert!(project.read_out("tags.rs").contains("struct Tags {"));
}

#[test]
fn test_preview_json() {
    let project = Project::new();
    let mut out = Vec::new();

    project
        .builder(project.settings())
        .preview(PreviewFormat::Json, &mut out)
        .unwrap();

    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let tables = &json["schemas"][0]["tables"];
    assert_eq!(tables[0]["name"], "Users");
    assert_eq!(tables[1]["foreign_keys"][0]["ref_table_db_name"], "users");
    assert_eq!(tables[1]["columns"][2]["type"], "Option<String>");
    // Preview never writes
    assert!(!project.out("").exists());
}

#[cfg(unix)]
mod unix {
    use super::*;

    /// Script appending its first argument to `hooks.log`
    fn hook_script(project: &Project) -> PathBuf {
        let log = project.root().join("hooks.log");
        let script = project.root().join("hook.sh");
        fs::write(&script, format!("echo \"$1\" >> '{}'\n", log.display())).unwrap();
        script
    }

    fn hook_log(project: &Project) -> Vec<PathBuf> {
        fs::read_to_string(project.root().join("hooks.log"))
            .unwrap_or_default()
            .lines()
            .map(PathBuf::from)
            .collect()
    }

    #[test]
    fn test_post_run_sees_each_written_file() {
        let project = Project::new();
        let mut settings = project.settings();
        settings.post_run = vec![
            "sh".into(),
            hook_script(&project).to_string_lossy().into_owned(),
            "$RDBI_GEN_FILE".into(),
        ];

        let report = project.builder(settings).generate().unwrap();

        assert_eq!(hook_log(&project), report.written);
    }

    #[test]
    fn test_post_run_skips_protected_files() {
        let project = Project::new();
        let mut settings = project.settings();
        project.builder(settings.clone()).generate().unwrap();

        settings.no_overwrite_globs = vec!["users.rs".into()];
        settings.post_run = vec![
            "sh".into(),
            hook_script(&project).to_string_lossy().into_owned(),
            "$RDBI_GEN_FILE".into(),
        ];
        project.builder(settings).generate().unwrap();

        let log = hook_log(&project);
        assert_eq!(log.len(), 3);
        assert!(!log.contains(&project.out("users.rs")));
    }

    #[test]
    fn test_post_run_failure_aborts() {
        let project = Project::new();
        let mut settings = project.settings();
        settings.post_run = vec!["sh".into(), "-c".into(), "exit 3".into()];

        let err = project.builder(settings).generate().unwrap_err();

        assert!(err.to_string().contains("schema public"), "{}", err);
        // The first file was written before its hook failed; nothing after it
        assert!(project.out("public/mod.rs").exists());
        assert!(!project.out("users.rs").exists());
    }

    #[test]
    fn test_external_engine_reads_data_file() {
        let project = Project::new();
        let mut settings = project.settings();
        settings.schema_paths.clear();
        settings.enum_paths.clear();
        settings.table_paths = [("{{ table | snake }}.json".to_string(), "missing.tpl".into())]
            .into_iter()
            .collect();
        settings.template_engine.command_line =
            vec!["cp".into(), "{{ data }}".into(), "{{ output }}".into()];

        let report = project.builder(settings).generate().unwrap();
        assert_eq!(report.written.len(), 2);

        let doc: serde_json::Value =
            serde_json::from_str(&project.read_out("users.json")).unwrap();
        assert_eq!(doc["table"]["db_name"], "users");
        assert_eq!(doc["params"]["banner"], "generated, do not edit");
        assert_eq!(doc["config"]["schemas"][0], "public");
        assert_eq!(doc["db"]["schemas"][0]["tables"][1]["db_name"], "posts");
    }

    #[test]
    fn test_external_engine_not_run_for_protected_file() {
        let project = Project::new();
        project.write("out/users.json", "hand written");
        let log = project.root().join("engine.log");

        let mut settings = project.settings();
        settings.schema_paths.clear();
        settings.enum_paths.clear();
        settings.table_paths = [("{{ table | snake }}.json".to_string(), "table.tpl".into())]
            .into_iter()
            .collect();
        settings.no_overwrite_globs = vec!["*.json".into()];
        // One log line per invocation
        settings.template_engine.command_line = vec![
            "sh".into(),
            "-c".into(),
            format!("echo ran >> '{}'; cp \"$1\" \"$2\"", log.display()),
            "engine".into(),
            "{{ data }}".into(),
            "{{ output }}".into(),
        ];

        let report = project.builder(settings).generate().unwrap();

        assert_eq!(report.skipped, vec![project.out("users.json")]);
        assert_eq!(project.read_out("users.json"), "hand written");
        assert!(project.out("posts.json").exists());
        // Two tables, one of them protected
        assert_eq!(fs::read_to_string(&log).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_external_engine_stdin_stdout() {
        let project = Project::new();
        let mut settings = project.settings();
        settings.table_paths.clear();
        settings.schema_paths.clear();
        settings.template_engine.command_line = vec![
            "sh".into(),
            "-c".into(),
            "printf '%s|' \"$1\"; cat".into(),
            "engine".into(),
            "{{ template }}".into(),
        ];
        settings.template_engine.use_stdin = true;
        settings.template_engine.use_stdout = true;

        project.builder(settings).generate().unwrap();

        let rendered = project.read_out("enums/users_status.rs");
        let (template, data) = rendered.split_once('|').unwrap();
        assert!(template.ends_with("enum.rs.tera"), "{}", template);
        let doc: serde_json::Value = serde_json::from_str(data).unwrap();
        assert_eq!(doc["enum"]["values"][1]["db_name"], "banned");
    }

    #[test]
    fn test_external_engine_timeout() {
        let project = Project::new();
        let mut settings = project.settings();
        settings.template_engine.command_line = vec!["sleep".into(), "5".into()];
        settings.template_engine.timeout_secs = 1;

        let err = project.builder(settings).generate().unwrap_err();
        assert!(err.to_string().contains("timed out"), "{}", err);
    }
}

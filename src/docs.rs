//! `quack readme` and `quack agents`.
//!
//! Both documents are drafted by an [`AnswerProvider`] from a
//! [`ProjectDigest`]: a summary of the indexed fragments (file layout,
//! detected technologies, entry points, endpoints, data models, and a few
//! sample excerpts). Nothing is re-read from disk; the index is the only
//! input.

use anyhow::{bail, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::info;

use quackstack_core::models::Fragment;
use quackstack_core::store::FragmentFilter;

use crate::answer::AnswerProvider;
use crate::index::CodeIndex;

const MAX_LISTED_FILES: usize = 50;
const MAX_ENTRY_POINTS: usize = 5;
const MAX_LISTED_ITEMS: usize = 10;
const MAX_DATA_MODELS: usize = 20;

static ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@?(?:app|router|api)\.(get|post|put|delete|patch)\(['"`]([^'"`]+)['"`]"#)
        .expect("route pattern")
});
static PRISMA_MODEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"model\s+(\w+)\s*\{").expect("model pattern"));
static TYPE_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:interface|type)\s+(\w+)\s*[={]").expect("type pattern"));
static PY_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+(\w+)(?:\(.*?\))?:").expect("class pattern"));
static CLASS_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+\w+").expect("class pattern"));
static ARROW_FN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"const\s+\w+\s*=\s*\(.*?\)\s*=>").expect("arrow pattern"));

/// Which document to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Readme,
    Agents,
}

impl DocKind {
    pub fn file_name(self) -> &'static str {
        match self {
            DocKind::Readme => "README.md",
            DocKind::Agents => "AGENTS.md",
        }
    }

    fn sample_count(self) -> usize {
        match self {
            DocKind::Readme => 10,
            DocKind::Agents => 15,
        }
    }

    fn sample_chars(self) -> usize {
        match self {
            DocKind::Readme => 200,
            DocKind::Agents => 300,
        }
    }

    /// The request handed to the provider as its question.
    pub fn instructions(self) -> &'static str {
        match self {
            DocKind::Readme => README_INSTRUCTIONS,
            DocKind::Agents => AGENTS_INSTRUCTIONS,
        }
    }
}

const README_INSTRUCTIONS: &str = "\
You are a technical documentation expert. Based on the codebase context, generate a \
comprehensive README.md file.

Include:
- Project title and description
- Technologies used
- Installation instructions
- Usage examples
- Project structure overview
- Key features
- Contributing guidelines (basic)

Make it professional, clear, and actionable. Reply with the markdown only.";

const AGENTS_INSTRUCTIONS: &str = "\
Generate an AGENTS.md file (https://agents.md/) describing this codebase for AI coding agents.

Use these markdown sections:
# Agent Metadata (name, description, version, author)
# Capabilities (features, commands, API endpoints, data processing)
# Technologies (languages, frameworks, databases, external services)
# Configuration (environment variables, API keys, setup)
# Usage Examples
# Context & Knowledge (domain, structure, architectural patterns)
# Constraints & Limitations (including security considerations)
# Tools & Integrations (external tools, CLI commands)

Be detailed and actionable. Reply with the markdown only.";

/// What the index knows about a project, condensed for a prompt.
#[derive(Debug, Clone, Default)]
pub struct ProjectDigest {
    pub project: String,
    /// Distinct file paths, sorted.
    pub files: Vec<String>,
    pub technologies: Vec<String>,
    pub tools: Vec<String>,
    /// `(file, function)` of likely entry points.
    pub entry_points: Vec<(String, Option<String>)>,
    /// `METHOD /path` routes found in Express or FastAPI style code.
    pub endpoints: Vec<String>,
    pub data_models: Vec<String>,
    pub patterns: Vec<String>,
    samples: Vec<(String, String)>,
}

impl ProjectDigest {
    /// Summarize `fragments` (expected in id order).
    pub fn from_fragments(project: &str, fragments: &[Fragment]) -> Self {
        let files: BTreeSet<&str> = fragments.iter().map(|f| f.file_path.as_str()).collect();

        let entry_points = fragments
            .iter()
            .filter(|f| is_entry_point(f))
            .take(MAX_ENTRY_POINTS)
            .map(|f| (f.file_path.clone(), f.function_name.clone()))
            .collect();

        let mut endpoints = BTreeSet::new();
        let mut models = BTreeSet::new();
        for f in fragments {
            for caps in ROUTE.captures_iter(&f.content) {
                endpoints.insert(format!("{} {}", caps[1].to_uppercase(), &caps[2]));
            }
            for caps in PRISMA_MODEL.captures_iter(&f.content) {
                models.insert(format!("Prisma: {}", &caps[1]));
            }
            for caps in TYPE_DECL.captures_iter(&f.content) {
                let name = &caps[1];
                if name.len() > 2 && name.starts_with(|c: char| c.is_uppercase()) {
                    models.insert(format!("Type: {}", name));
                }
            }
            for caps in PY_CLASS.captures_iter(&f.content) {
                models.insert(format!("Class: {}", &caps[1]));
            }
        }

        Self {
            project: project.to_string(),
            files: files.into_iter().map(str::to_string).collect(),
            technologies: detect_technologies(fragments),
            tools: detect_tools(fragments),
            entry_points,
            endpoints: endpoints.into_iter().collect(),
            data_models: models.into_iter().take(MAX_DATA_MODELS).collect(),
            patterns: detect_patterns(fragments),
            samples: fragments
                .iter()
                .map(|f| (f.file_path.clone(), f.content.clone()))
                .collect(),
        }
    }

    /// The provider context for `kind`.
    pub fn render(&self, kind: DocKind) -> String {
        let mut out = format!("Project: {}\n\n", self.project);

        out.push_str(&format!("File Structure ({} files):\n", self.files.len()));
        for file in self.files.iter().take(MAX_LISTED_FILES) {
            out.push_str(&format!("- {}\n", file));
        }
        if self.files.len() > MAX_LISTED_FILES {
            out.push_str(&format!(
                "... and {} more files\n",
                self.files.len() - MAX_LISTED_FILES
            ));
        }

        out.push_str(&format!(
            "\nTechnologies Detected:\n{}\n",
            self.technologies.join(", ")
        ));

        out.push_str("\nEntry Points:\n");
        for (file, function) in &self.entry_points {
            match function {
                Some(name) => out.push_str(&format!("- {} ({})\n", file, name)),
                None => out.push_str(&format!("- {}\n", file)),
            }
        }

        if kind == DocKind::Agents {
            out.push_str(&format!("\nTools & Dependencies:\n{}\n", self.tools.join(", ")));
            out.push_str("\nAPI Endpoints:\n");
            for endpoint in self.endpoints.iter().take(MAX_LISTED_ITEMS) {
                out.push_str(&format!("- {}\n", endpoint));
            }
            out.push_str("\nData Models:\n");
            for model in self.data_models.iter().take(MAX_LISTED_ITEMS) {
                out.push_str(&format!("- {}\n", model));
            }
            let patterns = if self.patterns.is_empty() {
                "Standard procedural code".to_string()
            } else {
                self.patterns.join(", ")
            };
            out.push_str(&format!("\nKey Code Patterns:\n{}\n", patterns));
        }

        out.push_str("\nSample Code Snippets:\n");
        let samples: Vec<String> = self
            .samples
            .iter()
            .take(kind.sample_count())
            .map(|(file, content)| {
                let head: String = content.chars().take(kind.sample_chars()).collect();
                format!("File: {}\n{}...\n", file, head)
            })
            .collect();
        out.push_str(&samples.join("---\n"));
        out
    }
}

fn is_entry_point(fragment: &Fragment) -> bool {
    let path = &fragment.file_path;
    path.contains("main")
        || path.contains("index")
        || path.contains("app")
        || fragment
            .function_name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains("main"))
}

fn detect_technologies(fragments: &[Fragment]) -> Vec<String> {
    const BY_EXTENSION: &[(&str, &str)] = &[
        (".tsx", "React"),
        (".jsx", "React"),
        (".ts", "TypeScript"),
        (".js", "JavaScript"),
        (".py", "Python"),
        (".rs", "Rust"),
        (".go", "Go"),
        (".java", "Java"),
    ];
    const BY_CONTENT: &[(&str, &str)] = &[
        ("prisma", "Prisma"),
        ("express", "Express"),
        ("fastapi", "FastAPI"),
        ("django", "Django"),
        ("flask", "Flask"),
        ("next", "Next.js"),
        ("vue", "Vue"),
        ("svelte", "Svelte"),
        ("postgres", "PostgreSQL"),
        ("mongodb", "MongoDB"),
        ("redis", "Redis"),
        ("mysql", "MySQL"),
        ("docker", "Docker"),
        ("kubernetes", "Kubernetes"),
        ("graphql", "GraphQL"),
        ("grpc", "gRPC"),
    ];

    let mut found = BTreeSet::new();
    for f in fragments {
        let path = f.file_path.to_lowercase();
        let content = f.content.to_lowercase();
        for (ext, tech) in BY_EXTENSION {
            if path.ends_with(ext) {
                found.insert(*tech);
            }
        }
        if path.contains("prisma") {
            found.insert("Prisma");
        }
        for (needle, tech) in BY_CONTENT {
            if content.contains(needle) {
                found.insert(*tech);
            }
        }
    }
    found.into_iter().map(str::to_string).collect()
}

fn detect_tools(fragments: &[Fragment]) -> Vec<String> {
    const TOOLS: &[(&str, &str)] = &[
        ("axios", "Axios"),
        ("fetch", "Fetch API"),
        ("chalk", "Chalk"),
        ("commander", "Commander"),
        ("readline", "Readline"),
        ("openai", "OpenAI"),
        ("anthropic", "Anthropic"),
        ("langchain", "LangChain"),
        ("pinecone", "Pinecone"),
        ("supabase", "Supabase"),
        ("stripe", "Stripe"),
        ("aws", "AWS"),
        ("vercel", "Vercel"),
    ];
    let mut found = BTreeSet::new();
    for f in fragments {
        let content = f.content.to_lowercase();
        for (needle, tool) in TOOLS {
            if content.contains(needle) {
                found.insert(*tool);
            }
        }
    }
    found.into_iter().map(str::to_string).collect()
}

fn any_content(fragments: &[Fragment], pred: impl Fn(&str) -> bool) -> bool {
    fragments.iter().any(|f| pred(&f.content))
}

fn detect_patterns(fragments: &[Fragment]) -> Vec<String> {
    let mut patterns = Vec::new();
    if any_content(fragments, |c| c.contains("async") || c.contains("Promise")) {
        patterns.push("Asynchronous operations".to_string());
    }
    if any_content(fragments, |c| CLASS_DECL.is_match(c)) {
        patterns.push("Object-oriented patterns".to_string());
    }
    if any_content(fragments, |c| ARROW_FN.is_match(c)) {
        patterns.push("Functional programming".to_string());
    }
    if any_content(fragments, |c| c.contains("try") && c.contains("catch")) {
        patterns.push("Error handling with try-catch".to_string());
    }
    patterns
}

/// Draft a `kind` document for `project` from its indexed fragments.
///
/// Fails when the project has nothing indexed.
pub async fn generate_document(
    index: &CodeIndex,
    project: &str,
    kind: DocKind,
    provider: &dyn AnswerProvider,
) -> Result<String> {
    let fragments = index
        .store()
        .find_many(project, &FragmentFilter::default())
        .await?;
    if fragments.is_empty() {
        bail!(
            "project {} has no indexed fragments; run `quack ingest` first",
            project
        );
    }

    let digest = ProjectDigest::from_fragments(project, &fragments);
    info!(
        project,
        document = kind.file_name(),
        files = digest.files.len(),
        provider = provider.name(),
        "generating document"
    );
    provider
        .generate_answer(kind.instructions(), &digest.render(kind))
        .await
}

/// Generate `kind` and write it to `output` (default `<root>/<file_name>`).
///
/// An existing file is only replaced with `force`; the check runs before
/// the provider is called.
pub async fn run_generate(
    index: &CodeIndex,
    root: &Path,
    project: &str,
    kind: DocKind,
    provider: &dyn AnswerProvider,
    output: Option<PathBuf>,
    force: bool,
) -> Result<PathBuf> {
    let path = output.unwrap_or_else(|| root.join(kind.file_name()));
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }

    let document = generate_document(index, project, kind, provider).await?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, document.trim_end().to_string() + "\n")?;
    println!("{} generated at {}", kind.file_name(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quackstack_core::models::RevisionInfo;

    fn fragment(id: i64, path: &str, function: Option<&str>, content: &str) -> Fragment {
        Fragment {
            id,
            content: content.to_string(),
            file_path: path.to_string(),
            project_name: "demo".to_string(),
            language: ".ts".to_string(),
            function_name: function.map(str::to_string),
            line_start: None,
            line_end: None,
            embedding: Vec::new(),
            revision: RevisionInfo::default(),
            updated_at: 0,
        }
    }

    fn corpus() -> Vec<Fragment> {
        vec![
            fragment(
                1,
                "src/server.ts",
                Some("routes"),
                "router.get('/users', list);\napp.post(\"/users\", create);",
            ),
            fragment(
                2,
                "src/models.ts",
                None,
                "export interface UserRecord { id: string }\ntype Id = string;",
            ),
            fragment(
                3,
                "api/main.py",
                Some("main"),
                "class Account(Base):\n    pass\n@app.delete('/accounts/{id}')",
            ),
            fragment(
                4,
                "src/client.ts",
                Some("load"),
                "async function load() { try { await fetch(url) } catch (e) {} }",
            ),
        ]
    }

    #[test]
    fn test_digest_detects_routes_and_models() {
        let digest = ProjectDigest::from_fragments("demo", &corpus());
        assert_eq!(
            digest.endpoints,
            ["DELETE /accounts/{id}", "GET /users", "POST /users"]
        );
        assert!(digest.data_models.contains(&"Type: UserRecord".to_string()));
        assert!(digest.data_models.contains(&"Class: Account".to_string()));
        // Too short to count as a model name.
        assert!(!digest.data_models.iter().any(|m| m.ends_with(": Id")));
    }

    #[test]
    fn test_digest_technologies_tools_and_patterns() {
        let digest = ProjectDigest::from_fragments("demo", &corpus());
        assert_eq!(digest.technologies, ["Python", "TypeScript"]);
        assert_eq!(digest.tools, ["Fetch API"]);
        assert!(digest.patterns.contains(&"Asynchronous operations".to_string()));
        assert!(digest
            .patterns
            .contains(&"Error handling with try-catch".to_string()));
    }

    #[test]
    fn test_entry_points_by_path_or_function_name() {
        let digest = ProjectDigest::from_fragments("demo", &corpus());
        assert_eq!(
            digest.entry_points,
            [("api/main.py".to_string(), Some("main".to_string()))]
        );
    }

    #[test]
    fn test_readme_context_omits_agent_sections() {
        let digest = ProjectDigest::from_fragments("demo", &corpus());
        let readme = digest.render(DocKind::Readme);
        assert!(readme.contains("File Structure (4 files):"));
        assert!(readme.contains("- api/main.py (main)"));
        assert!(!readme.contains("API Endpoints:"));

        let agents = digest.render(DocKind::Agents);
        assert!(agents.contains("API Endpoints:\n- DELETE /accounts/{id}"));
        assert!(agents.contains("Key Code Patterns:"));
    }

    #[test]
    fn test_long_file_lists_are_truncated() {
        let fragments: Vec<Fragment> = (0..(MAX_LISTED_FILES as i64 + 3))
            .map(|i| fragment(i, &format!("src/f{:03}.ts", i), None, "const x = 1;"))
            .collect();
        let context = ProjectDigest::from_fragments("demo", &fragments).render(DocKind::Agents);
        assert!(context.contains("... and 3 more files"));
        assert!(!context.contains("src/f052.ts"));
    }

    #[test]
    fn test_samples_are_clipped() {
        let long = "y".repeat(400);
        let fragments = vec![fragment(1, "a.ts", None, &long)];
        let context = ProjectDigest::from_fragments("demo", &fragments).render(DocKind::Readme);
        assert!(context.contains(&format!("{}...", "y".repeat(200))));
        assert!(!context.contains(&"y".repeat(201)));
    }
}

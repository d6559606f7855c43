//! Command-line interface for xsdcover

#[cfg(feature = "cli")]
mod cli {
    use std::path::{Path, PathBuf};
    use std::process::ExitCode;

    use clap::{Parser, Subcommand};

    use xsdcover::coverage::CoverageMeasurer;
    use xsdcover::enumerator::enumerate_paths;
    use xsdcover::error::Error;
    use xsdcover::generators::{
        extract_optional_items, Materializer, PairwiseGenerator, PatternPolicy, SelectedPaths,
        SetCoverOptimizer, SmtGenerator, SnippetGenerator,
    };
    use xsdcover::schema::SchemaModel;
    use xsdcover::validator::XmlValidator;

    /// Exit codes of the driver
    const EXIT_USAGE: u8 = 1;
    const EXIT_SCHEMA: u8 = 2;
    const EXIT_GENERATION: u8 = 3;
    const EXIT_VALIDATION: u8 = 4;

    #[derive(Parser, Debug)]
    #[command(name = "xsdcover", version, about = "XSD path coverage measurement and test generation")]
    struct Cli {
        #[command(subcommand)]
        command: Command,
    }

    #[derive(Subcommand, Debug)]
    enum Command {
        /// Measure path coverage of XML documents against a schema
        Coverage {
            /// Schema file
            schema: PathBuf,
            /// XML documents to measure
            #[arg(required = true)]
            xml: Vec<PathBuf>,
            /// Recursion-unfolding depth bound
            #[arg(long, default_value_t = 10)]
            max_depth: usize,
            /// Emit the report as JSON
            #[arg(long)]
            json: bool,
        },

        /// Generate documents by greedy set-cover over snippet candidates
        Greedy {
            /// Schema file
            schema: PathBuf,
            /// Directory the generated files are written to
            #[arg(short, long)]
            output_dir: PathBuf,
            /// Recursion-unfolding depth bound
            #[arg(long, default_value_t = 10)]
            max_depth: usize,
            /// Depth frontier for snippet candidates
            #[arg(long, default_value_t = 10)]
            max_gen_depth: usize,
            /// Stop once this coverage fraction is reached
            #[arg(long, default_value_t = 0.90)]
            target_coverage: f64,
            /// Maximum number of generated files
            #[arg(long, default_value_t = 10)]
            max_files: usize,
            /// Namespace override as prefix=uri
            #[arg(long)]
            namespace: Option<String>,
        },

        /// Generate one document via the boolean constraint optimizer
        Smt {
            /// Schema file
            schema: PathBuf,
            /// Directory the generated file is written to
            #[arg(short, long)]
            output_dir: PathBuf,
            /// Recursion-unfolding depth bound
            #[arg(long, default_value_t = 10)]
            max_depth: usize,
            /// Coverage fraction reported against
            #[arg(long, default_value_t = 0.95)]
            target_coverage: f64,
            /// Solver deadline in milliseconds
            #[arg(long, default_value_t = 60_000)]
            timeout_ms: u64,
            /// Namespace override as prefix=uri
            #[arg(long)]
            namespace: Option<String>,
        },

        /// Generate documents from a pairwise covering array
        Pairwise {
            /// Schema file
            schema: PathBuf,
            /// Directory the generated files are written to
            #[arg(short, long)]
            output_dir: PathBuf,
            /// Recursion-unfolding depth bound
            #[arg(long, default_value_t = 10)]
            max_depth: usize,
            /// Maximum number of test patterns
            #[arg(long, default_value_t = 50)]
            max_patterns: usize,
            /// RNG seed for candidate sampling
            #[arg(long, default_value_t = 42)]
            random_seed: u64,
            /// Namespace override as prefix=uri
            #[arg(long)]
            namespace: Option<String>,
        },

        /// Validate XML files against the schema
        Validate {
            /// Schema file
            schema: PathBuf,
            /// XML documents to validate
            #[arg(required = true)]
            xml: Vec<PathBuf>,
            /// Also write the summary to this file
            #[arg(long)]
            report: Option<PathBuf>,
        },
    }

    pub fn main() -> ExitCode {
        env_logger::init();

        let cli = match Cli::try_parse() {
            Ok(cli) => cli,
            Err(e) => {
                // Help and version output are not usage errors
                let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
                let _ = e.print();
                return ExitCode::from(code);
            }
        };

        match run(cli.command) {
            Ok(code) => ExitCode::from(code),
            Err(e) => {
                eprintln!("error: {}", e);
                let code = match e {
                    Error::Generation(_) => EXIT_GENERATION,
                    _ => EXIT_SCHEMA,
                };
                ExitCode::from(code)
            }
        }
    }

    fn run(command: Command) -> Result<u8, Error> {
        match command {
            Command::Coverage {
                schema,
                xml,
                max_depth,
                json,
            } => coverage(&schema, &xml, max_depth, json),
            Command::Greedy {
                schema,
                output_dir,
                max_depth,
                max_gen_depth,
                target_coverage,
                max_files,
                namespace,
            } => greedy(
                &schema,
                &output_dir,
                max_depth,
                max_gen_depth,
                target_coverage,
                max_files,
                namespace,
            ),
            Command::Smt {
                schema,
                output_dir,
                max_depth,
                target_coverage,
                timeout_ms,
                namespace,
            } => smt(
                &schema,
                &output_dir,
                max_depth,
                target_coverage,
                timeout_ms,
                namespace,
            ),
            Command::Pairwise {
                schema,
                output_dir,
                max_depth,
                max_patterns,
                random_seed,
                namespace,
            } => pairwise(
                &schema,
                &output_dir,
                max_depth,
                max_patterns,
                random_seed,
                namespace,
            ),
            Command::Validate {
                schema,
                xml,
                report,
            } => validate(&schema, &xml, report.as_deref()),
        }
    }

    fn coverage(
        schema: &Path,
        xml: &[PathBuf],
        max_depth: usize,
        json: bool,
    ) -> Result<u8, Error> {
        let model = SchemaModel::from_file(schema)?;
        let enumeration = enumerate_paths(&model, max_depth)?;

        let mut measurer = CoverageMeasurer::new(&enumeration.ground);
        for file in xml {
            measurer.add_file(file);
        }

        let report = measurer.report();
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report)
                    .map_err(|e| Error::Other(format!("Failed to encode report: {}", e)))?
            );
        } else {
            print!("{}", report.render_text());
        }
        Ok(0)
    }

    #[allow(clippy::too_many_arguments)]
    fn greedy(
        schema: &Path,
        output_dir: &Path,
        max_depth: usize,
        max_gen_depth: usize,
        target_coverage: f64,
        max_files: usize,
        namespace: Option<String>,
    ) -> Result<u8, Error> {
        let model = SchemaModel::from_file(schema)?;
        let enumeration = enumerate_paths(&model, max_depth)?;

        let materializer = configured_materializer(&model, schema, namespace);
        let snippets = SnippetGenerator::new(&model, materializer, max_gen_depth).generate();
        let selection = SetCoverOptimizer::new(target_coverage, max_files)
            .solve(&enumeration.ground, &snippets);

        std::fs::create_dir_all(output_dir)?;
        for (i, snippet) in selection.selected.iter().enumerate() {
            let name = format!("greedy_generated_{:03}.xml", i + 1);
            snippet.document.write_to_file(output_dir.join(&name))?;
            println!("  {}", name);
        }

        println!(
            "{} files, {:.2}% path coverage ({} of {} paths)",
            selection.selected.len(),
            selection.coverage * 100.0,
            selection.covered.len(),
            enumeration.ground.len()
        );
        if selection.coverage < target_coverage {
            println!(
                "note: target coverage {:.2}% was not reachable with the candidate family",
                target_coverage * 100.0
            );
        }
        Ok(0)
    }

    fn smt(
        schema: &Path,
        output_dir: &Path,
        max_depth: usize,
        target_coverage: f64,
        timeout_ms: u64,
        namespace: Option<String>,
    ) -> Result<u8, Error> {
        let model = SchemaModel::from_file(schema)?;
        let enumeration = enumerate_paths(&model, max_depth)?;

        let solution = SmtGenerator::new(max_depth, timeout_ms).solve(&enumeration)?;

        let root = enumeration
            .ground
            .roots()
            .next()
            .and_then(|p| model.roots.iter().find(|r| r.name == p.local_name()))
            .ok_or_else(|| Error::Other("Schema declares no root element".to_string()))?;

        let materializer = configured_materializer(&model, schema, namespace);
        let policy = SelectedPaths::new(&solution.selected, max_depth);
        let out = materializer.materialize(root, &policy);

        std::fs::create_dir_all(output_dir)?;
        let name = "smt_generated_001.xml";
        out.document.write_to_file(output_dir.join(name))?;
        println!("  {}", name);

        println!(
            "solver coverage {:.2}% over {} paths",
            solution.coverage * 100.0,
            enumeration.ground.len()
        );
        if solution.coverage < target_coverage {
            println!(
                "note: below the {:.2}% target; constraints exclude the remainder",
                target_coverage * 100.0
            );
        }
        Ok(0)
    }

    fn pairwise(
        schema: &Path,
        output_dir: &Path,
        max_depth: usize,
        max_patterns: usize,
        random_seed: u64,
        namespace: Option<String>,
    ) -> Result<u8, Error> {
        let model = SchemaModel::from_file(schema)?;
        let enumeration = enumerate_paths(&model, max_depth)?;

        let items = extract_optional_items(&enumeration);
        let array = PairwiseGenerator::new(max_patterns, random_seed).generate(&items);

        let root = model
            .roots
            .first()
            .ok_or_else(|| Error::Other("Schema declares no root element".to_string()))?;
        let materializer = configured_materializer(&model, schema, namespace);

        std::fs::create_dir_all(output_dir)?;
        for pattern in &array.patterns {
            let policy = PatternPolicy::new(pattern, max_depth);
            let out = materializer.materialize(root, &policy);
            let name = format!("pairwise_generated_{:03}.xml", pattern.id + 1);
            out.document.write_to_file(output_dir.join(&name))?;
            println!("  {}", name);
        }

        println!(
            "{} optional items, {} patterns, {:.2}% pair coverage",
            items.len(),
            array.patterns.len(),
            array.coverage * 100.0
        );
        Ok(0)
    }

    fn validate(
        schema: &Path,
        xml: &[PathBuf],
        report: Option<&Path>,
    ) -> Result<u8, Error> {
        let model = SchemaModel::from_file(schema)?;
        let validator = XmlValidator::new(&model);
        let summary = validator.validate_files(xml);

        let text = summary.render_text();
        print!("{}", text);
        if let Some(path) = report {
            std::fs::write(path, &text)?;
        }

        Ok(if summary.all_valid() { 0 } else { EXIT_VALIDATION })
    }

    /// Build a materializer carrying the output namespace and the
    /// xsi:schemaLocation hint for the schema file
    fn configured_materializer<'a>(
        model: &'a SchemaModel,
        schema: &Path,
        namespace: Option<String>,
    ) -> Materializer<'a> {
        let ns_override = namespace.map(|value| match value.split_once('=') {
            Some((_prefix, uri)) => uri.to_string(),
            None => value,
        });

        let mut materializer = Materializer::new(model).with_namespace(ns_override);
        if let Some(name) = schema.file_name().and_then(|n| n.to_str()) {
            materializer = materializer.with_schema_location(name);
        }
        materializer
    }
}

#[cfg(feature = "cli")]
fn main() -> std::process::ExitCode {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}

use clap::Parser;
use mpijob_builder::{schema, MpiJobBuilder, Result as JobResult, SchemaVariant, StorageSettings};

#[derive(Parser, Debug)]
#[command(
    name = "render-mpijob",
    about = "Build an MPIJob manifest and print it as YAML or submit it to the cluster"
)]
struct Args {
    /// Job name
    name: String,

    /// MPIJob schema version to target: v1alpha1, v1alpha2 or v1
    #[arg(long, default_value = "v1")]
    schema: String,

    /// Container image for all roles
    #[arg(long)]
    image: Option<String>,

    /// Worker replica count
    #[arg(long, default_value_t = 1)]
    replicas: i32,

    /// Target namespace
    #[arg(long, default_value = schema::DEFAULT_NAMESPACE)]
    namespace: String,

    /// GPUs per worker
    #[arg(long)]
    gpus: Option<u32>,

    /// Logical storage path to mount at /User, e.g. "~/" or "users/jane/data"
    #[arg(long)]
    volume: Option<String>,

    /// Working directory for all roles
    #[arg(long)]
    working_dir: Option<String>,

    /// Submit to the cluster instead of printing YAML
    #[arg(long)]
    submit: bool,

    /// Command run by the workers under "mpirun python", e.g. -- train.py --epochs 10
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn parse_variant(schema: &str) -> anyhow::Result<SchemaVariant> {
    match schema {
        "v1alpha1" => Ok(SchemaVariant::V1Alpha1),
        "v1alpha2" => Ok(SchemaVariant::V1Alpha2),
        "v1" => Ok(SchemaVariant::V1),
        other => anyhow::bail!("unknown schema version: {}", other),
    }
}

fn build(args: &Args, variant: SchemaVariant) -> JobResult<MpiJobBuilder> {
    let settings = StorageSettings::from_env();
    let mut job = MpiJobBuilder::new(variant, &args.name, settings)?;
    job.with_namespace(&args.namespace);
    job.with_replicas(args.replicas)?;

    if let Some(image) = &args.image {
        job.with_image(image);
    }
    if !args.command.is_empty() {
        job.with_command(args.command.iter().cloned());
    }
    if let Some(gpus) = args.gpus {
        job.with_gpus(gpus, schema::GPU_RESOURCE_KEY);
    }
    if let Some(path) = &args.volume {
        job.with_volume(schema::DEFAULT_MOUNT_PATH, path, "")?;
    }
    if let Some(dir) = &args.working_dir {
        job.with_working_dir(dir);
    }

    Ok(job)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let variant = parse_variant(&args.schema)?;
    let mut job = build(&args, variant)?;

    if args.submit {
        job.submit().await?;
    } else {
        println!("{}", job.to_yaml()?);
    }

    Ok(())
}

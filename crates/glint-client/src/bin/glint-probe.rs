//! Interactive smoke client for a running glint bridge.
//!
//! Connects, lists the capability surface, compiles a demo program,
//! uploads a triangle, draws it, and checks the error state.
//!
//! Usage:
//!   cargo run --bin glint-probe -- --socket /tmp/glint-bridge.sock

use anyhow::Context as _;
use clap::Parser;
use glint_client::{f32_bytes, glu, BridgeClient};
use glint_proto::Instruction;
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

const VERTEX_SHADER: &str = "\
attribute vec3 position;
uniform mat4 projection;
void main() {
    gl_Position = projection * vec4(position, 1.0);
}
";

const FRAGMENT_SHADER: &str = "\
void main() {
    gl_FragColor = vec4(1.0, 0.5, 0.2, 1.0);
}
";

#[derive(Parser, Debug)]
#[command(name = "glint-probe")]
#[command(about = "Exercise a running glint bridge over its Unix socket")]
struct Cli {
    /// Path to the bridge's Unix socket
    #[arg(long, default_value = "/tmp/glint-bridge.sock")]
    socket: PathBuf,
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    println!("=== glint probe ===");
    let mut client = BridgeClient::connect(&cli.socket).await?;

    let methods = client.methods().await?;
    println!("[1] context exposes {} operations", methods.len());

    let constants = client.constants().await?;
    println!("[2] context exposes {} constants", constants.len());
    let lookup = |name: &str| -> anyhow::Result<f64> {
        constants
            .get(name)
            .copied()
            .with_context(|| format!("missing constant {name}"))
    };

    let program = glu::make_program(&mut client, &constants, VERTEX_SHADER, FRAGMENT_SHADER)
        .await
        .context("compile demo program")?;
    println!("[3] compiled and linked program {program}");

    let array_buffer = lookup("ARRAY_BUFFER")?;
    let static_draw = lookup("STATIC_DRAW")?;
    let float = lookup("FLOAT")?;
    let triangles = lookup("TRIANGLES")?;
    let color_bit = lookup("COLOR_BUFFER_BIT")?;

    let buffer = client
        .query(vec![Instruction::query("createBuffer", vec![])], vec![])
        .await?
        .into_reply()?;
    let triangle = f32_bytes(&[0.0, 0.5, 0.0, -0.5, -0.5, 0.0, 0.5, -0.5, 0.0]);
    client
        .exec(
            vec![
                Instruction::exec("bindBuffer", vec![json!(array_buffer), buffer.clone()]),
                Instruction::exec(
                    "bufferData",
                    vec![json!(array_buffer), json!("bufferfloat32"), json!(static_draw)],
                ),
            ],
            vec![triangle],
        )
        .await?;
    println!("[4] uploaded triangle vertices into {buffer}");

    let location = client
        .query(
            vec![Instruction::query(
                "getAttribLocation",
                vec![json!(&program), json!("position")],
            )],
            vec![],
        )
        .await?
        .into_reply()?;
    println!("[5] attribute 'position' is at location {location}");

    let projection = glu::make_perspective(45.0, 1.0, 0.1, 100.0);
    let uniform = client
        .query(
            vec![Instruction::query(
                "getUniformLocation",
                vec![json!(&program), json!("projection")],
            )],
            vec![],
        )
        .await?
        .into_reply()?;
    client
        .exec(
            vec![
                Instruction::exec("useProgram", vec![json!(&program)]),
                Instruction::exec(
                    "uniformMatrix4fv",
                    vec![uniform, json!(false), json!("bufferfloat32")],
                ),
                Instruction::exec(
                    "vertexAttribPointer",
                    vec![
                        location.clone(),
                        json!(3),
                        json!(float),
                        json!(false),
                        json!(0),
                        json!(0),
                    ],
                ),
                Instruction::exec("enableVertexAttribArray", vec![location]),
                Instruction::exec("clearColor", vec![json!(0.1), json!(0.1), json!(0.1), json!(1.0)]),
                Instruction::exec("clear", vec![json!(color_bit)]),
                Instruction::exec("drawArrays", vec![json!(triangles), json!(0), json!(3)]),
            ],
            vec![f32_bytes(&projection)],
        )
        .await?;
    println!("[6] drew the triangle");

    let error = client
        .query(vec![Instruction::query("getError", vec![])], vec![])
        .await?
        .into_reply()?;
    println!("[7] getError reports {error}");

    let width = client
        .query(
            vec![Instruction::query("drawingBufferWidth", vec![])],
            vec![],
        )
        .await?
        .into_reply()?;
    let height = client
        .query(
            vec![Instruction::query("drawingBufferHeight", vec![])],
            vec![],
        )
        .await?
        .into_reply()?;
    println!("[8] drawing buffer is {width}x{height}");

    println!("=== probe complete ===");
    Ok(())
}

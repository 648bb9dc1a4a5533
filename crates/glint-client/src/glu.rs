//! GL utility helpers: camera matrices and shader/program builders.
//!
//! The matrix functions return column-major `[f32; 16]` suitable for
//! `uniformMatrix4fv`. The shader builders drive the bridge's
//! compile-and-check protocol through a [`BridgeClient`].

use anyhow::{bail, Context as _};
use glint_proto::Instruction;
use indexmap::IndexMap;
use nalgebra as na;
use serde_json::json;

use crate::BridgeClient;

/// Column-major 4x4 matrix in wire layout.
pub type Mat4 = [f32; 16];

/// Flatten to the wire's column-major layout, which is also nalgebra's
/// storage order.
fn flatten(m: &na::Matrix4<f32>) -> Mat4 {
    let mut out = [0.0; 16];
    out.copy_from_slice(m.as_slice());
    out
}

/// gluLookAt: a view matrix looking from the eye toward the center.
#[allow(clippy::too_many_arguments)]
pub fn make_look_at(
    ex: f32,
    ey: f32,
    ez: f32,
    cx: f32,
    cy: f32,
    cz: f32,
    ux: f32,
    uy: f32,
    uz: f32,
) -> Mat4 {
    let view = na::Matrix4::look_at_rh(
        &na::Point3::new(ex, ey, ez),
        &na::Point3::new(cx, cy, cz),
        &na::Vector3::new(ux, uy, uz),
    );
    flatten(&view)
}

/// gluPerspective: `fovy` is the vertical field of view in degrees.
pub fn make_perspective(fovy: f32, aspect: f32, znear: f32, zfar: f32) -> Mat4 {
    let projection = na::Perspective3::new(aspect, fovy.to_radians(), znear, zfar);
    flatten(projection.as_matrix())
}

/// glFrustum. nalgebra has no off-center constructor, so the matrix is
/// spelled out (row-major argument order, column-major storage).
pub fn make_frustum(left: f32, right: f32, bottom: f32, top: f32, znear: f32, zfar: f32) -> Mat4 {
    let x = 2.0 * znear / (right - left);
    let y = 2.0 * znear / (top - bottom);
    let a = (right + left) / (right - left);
    let b = (top + bottom) / (top - bottom);
    let c = -(zfar + znear) / (zfar - znear);
    let d = -2.0 * zfar * znear / (zfar - znear);

    #[rustfmt::skip]
    let m = na::Matrix4::new(
        x,   0.0, a,    0.0,
        0.0, y,   b,    0.0,
        0.0, 0.0, c,    d,
        0.0, 0.0, -1.0, 0.0,
    );
    flatten(&m)
}

/// glOrtho
pub fn make_ortho(left: f32, right: f32, bottom: f32, top: f32, znear: f32, zfar: f32) -> Mat4 {
    let projection = na::Orthographic3::new(left, right, bottom, top, znear, zfar);
    flatten(projection.as_matrix())
}

fn constant(constants: &IndexMap<String, f64>, name: &str) -> anyhow::Result<f64> {
    constants
        .get(name)
        .copied()
        .with_context(|| format!("bridge constants are missing {name}"))
}

/// Create and compile a shader, returning its variable handle.
///
/// On a failed compile the shader is deleted bridge-side and the info log
/// becomes the error message.
pub async fn make_shader(
    client: &mut BridgeClient,
    constants: &IndexMap<String, f64>,
    source: &str,
    shader_type: f64,
) -> anyhow::Result<String> {
    let compile_status = constant(constants, "COMPILE_STATUS")?;

    let handle = client
        .query(
            vec![Instruction::query("createShader", vec![json!(shader_type)])],
            vec![],
        )
        .await?
        .into_reply()?;
    let Some(shader) = handle.as_str().map(str::to_string) else {
        bail!("createShader did not return a shader handle");
    };

    let status = client
        .query(
            vec![
                Instruction::exec("shaderSource", vec![json!(shader), json!(source)]),
                Instruction::exec("compileShader", vec![json!(shader)]),
                Instruction::query(
                    "getShaderParameter",
                    vec![json!(shader), json!(compile_status)],
                ),
            ],
            vec![],
        )
        .await?
        .into_reply()?;

    if status.as_bool() != Some(true) {
        let log = client
            .query(
                vec![Instruction::query("getShaderInfoLog", vec![json!(shader)])],
                vec![],
            )
            .await?
            .into_reply()?;
        client
            .exec(
                vec![Instruction::exec("deleteShader", vec![json!(shader)])],
                vec![],
            )
            .await?;
        bail!(
            "an error occurred compiling the shaders: {}",
            log.as_str().unwrap_or_default()
        );
    }
    Ok(shader)
}

/// Create, compile and link a program from vertex and fragment sources,
/// returning the program's variable handle.
pub async fn make_program(
    client: &mut BridgeClient,
    constants: &IndexMap<String, f64>,
    vertex_source: &str,
    fragment_source: &str,
) -> anyhow::Result<String> {
    let vertex_type = constant(constants, "VERTEX_SHADER")?;
    let fragment_type = constant(constants, "FRAGMENT_SHADER")?;
    let link_status = constant(constants, "LINK_STATUS")?;

    let handle = client
        .query(vec![Instruction::query("createProgram", vec![])], vec![])
        .await?
        .into_reply()?;
    let Some(program) = handle.as_str().map(str::to_string) else {
        bail!("createProgram did not return a program handle");
    };

    let vertex = make_shader(client, constants, vertex_source, vertex_type).await?;
    let fragment = make_shader(client, constants, fragment_source, fragment_type).await?;

    let status = client
        .query(
            vec![
                Instruction::exec("attachShader", vec![json!(program), json!(vertex)]),
                Instruction::exec("attachShader", vec![json!(program), json!(fragment)]),
                Instruction::exec("linkProgram", vec![json!(program)]),
                Instruction::query(
                    "getProgramParameter",
                    vec![json!(program), json!(link_status)],
                ),
            ],
            vec![],
        )
        .await?
        .into_reply()?;

    if status.as_bool() != Some(true) {
        let log = client
            .query(
                vec![Instruction::query(
                    "getProgramInfoLog",
                    vec![json!(program)],
                )],
                vec![],
            )
            .await?
            .into_reply()?;
        bail!(
            "unable to initialize the shader program: {}",
            log.as_str().unwrap_or_default()
        );
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mat_eq(got: Mat4, want: Mat4) {
        for (i, (g, w)) in got.iter().zip(want.iter()).enumerate() {
            assert!((g - w).abs() < 1e-5, "element {i}: got {g}, want {w}");
        }
    }

    #[test]
    fn look_at_down_the_z_axis_is_a_translation() {
        let m = make_look_at(0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0);
        assert_mat_eq(
            m,
            [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, -5.0, 1.0,
            ],
        );
    }

    #[test]
    fn look_at_from_the_x_axis_swaps_basis_vectors() {
        let m = make_look_at(5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0);
        // Forward is -x, so the view x axis is the world -z axis.
        assert_mat_eq(
            m,
            [
                0.0, 0.0, 1.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                -1.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, -5.0, 1.0,
            ],
        );
    }

    #[test]
    fn symmetric_frustum_matches_the_known_form() {
        let m = make_frustum(-1.0, 1.0, -1.0, 1.0, 1.0, 3.0);
        assert_mat_eq(
            m,
            [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, -2.0, -1.0, //
                0.0, 0.0, -3.0, 0.0,
            ],
        );
    }

    #[test]
    fn off_center_frustum_flattens_column_major() {
        let m = make_frustum(0.0, 1.0, 0.0, 1.0, 1.0, 2.0);
        // The off-center terms land in the third column of the wire layout.
        assert_mat_eq(
            m,
            [
                2.0, 0.0, 0.0, 0.0, //
                0.0, 2.0, 0.0, 0.0, //
                1.0, 1.0, -3.0, -1.0, //
                0.0, 0.0, -4.0, 0.0,
            ],
        );
    }

    #[test]
    fn ninety_degree_perspective_is_the_unit_frustum() {
        let m = make_perspective(90.0, 1.0, 1.0, 3.0);
        assert_mat_eq(m, make_frustum(-1.0, 1.0, -1.0, 1.0, 1.0, 3.0));
    }

    #[test]
    fn unit_ortho_flips_z() {
        let m = make_ortho(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0);
        assert_mat_eq(
            m,
            [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, -1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        );
    }
}

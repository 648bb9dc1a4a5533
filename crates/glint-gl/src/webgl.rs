//! The stock GL operation and constant registry.
//!
//! One builder invocation wires every shipped operation to its [`GlState`]
//! counterpart and registers the constant table the operations use.
//! `drawingBufferWidth`/`drawingBufferHeight` are zero-argument operations
//! rather than constants: they vary per context, constants do not.

use crate::consts;
use crate::registry::{Registry, RegistryBuilder};
use crate::state::{BufferId, ProgramId, ShaderId, TextureId, UniformLocation};
use crate::value::Return;

/// Build the stock GL registry.
pub fn registry() -> Registry {
    let builder = Registry::builder()
        .op("getError", |state, args| {
            args.exactly(0)?;
            Ok(Return::number(state.take_error() as f64))
        })
        .op("drawingBufferWidth", |state, args| {
            args.exactly(0)?;
            Ok(Return::number(state.drawing_buffer_width))
        })
        .op("drawingBufferHeight", |state, args| {
            args.exactly(0)?;
            Ok(Return::number(state.drawing_buffer_height))
        })
        .op("getParameter", |state, args| {
            args.exactly(1)?;
            Ok(match args.enum_value(0)? {
                consts::VIEWPORT => Return::opaque(state.viewport),
                consts::COLOR_CLEAR_VALUE => Return::opaque(state.clear_color),
                consts::CURRENT_PROGRAM => match state.current_program {
                    Some(program) => Return::opaque(program),
                    None => Return::null(),
                },
                consts::ACTIVE_TEXTURE => Return::number(consts::TEXTURE0 as f64),
                consts::MAX_VERTEX_ATTRIBS => Return::number(16.0),
                _ => {
                    state.set_error(consts::INVALID_ENUM);
                    Return::null()
                }
            })
        })
        .op("clearColor", |state, args| {
            args.exactly(4)?;
            state.clear_color = [
                args.number(0)? as f32,
                args.number(1)? as f32,
                args.number(2)? as f32,
                args.number(3)? as f32,
            ];
            Ok(Return::Undefined)
        })
        .op("clear", |state, args| {
            args.exactly(1)?;
            state.clear(args.enum_value(0)?);
            Ok(Return::Undefined)
        })
        .op("viewport", |state, args| {
            args.exactly(4)?;
            state.viewport = [
                args.integer(0)? as i32,
                args.integer(1)? as i32,
                args.integer(2)? as i32,
                args.integer(3)? as i32,
            ];
            Ok(Return::Undefined)
        })
        .op("enable", |state, args| {
            args.exactly(1)?;
            state.set_capability(args.enum_value(0)?, true);
            Ok(Return::Undefined)
        })
        .op("disable", |state, args| {
            args.exactly(1)?;
            state.set_capability(args.enum_value(0)?, false);
            Ok(Return::Undefined)
        });

    let builder = shader_ops(builder);
    let builder = buffer_ops(builder);
    let builder = draw_ops(builder);
    constants(builder).build()
}

fn shader_ops(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .op("createShader", |state, args| {
            args.exactly(1)?;
            Ok(match state.create_shader(args.enum_value(0)?) {
                Some(shader) => Return::opaque(shader),
                None => Return::null(),
            })
        })
        .op("shaderSource", |state, args| {
            args.exactly(2)?;
            let shader = args.opaque::<ShaderId>(0)?;
            let source = args.string(1)?.to_string();
            match state.shader_mut(*shader) {
                Some(record) => record.source = source,
                None => state.set_error(consts::INVALID_OPERATION),
            }
            Ok(Return::Undefined)
        })
        .op("compileShader", |state, args| {
            args.exactly(1)?;
            state.compile_shader(*args.opaque::<ShaderId>(0)?);
            Ok(Return::Undefined)
        })
        .op("getShaderParameter", |state, args| {
            args.exactly(2)?;
            let shader = args.opaque::<ShaderId>(0)?;
            let pname = args.enum_value(1)?;
            let Some(record) = state.shaders.get(&shader.0) else {
                state.set_error(consts::INVALID_OPERATION);
                return Ok(Return::null());
            };
            Ok(match pname {
                consts::COMPILE_STATUS => Return::boolean(record.compiled),
                consts::DELETE_STATUS => Return::boolean(record.deleted),
                consts::SHADER_TYPE => Return::number(record.kind as f64),
                _ => {
                    state.set_error(consts::INVALID_ENUM);
                    Return::null()
                }
            })
        })
        .op("getShaderInfoLog", |state, args| {
            args.exactly(1)?;
            let shader = args.opaque::<ShaderId>(0)?;
            Ok(match state.shaders.get(&shader.0) {
                Some(record) => Return::string(record.info_log.clone()),
                None => {
                    state.set_error(consts::INVALID_OPERATION);
                    Return::null()
                }
            })
        })
        .op("deleteShader", |state, args| {
            args.exactly(1)?;
            state.delete_shader(*args.opaque::<ShaderId>(0)?);
            Ok(Return::Undefined)
        })
        .op("createProgram", |state, args| {
            args.exactly(0)?;
            Ok(Return::opaque(state.create_program()))
        })
        .op("attachShader", |state, args| {
            args.exactly(2)?;
            let program = args.opaque::<ProgramId>(0)?;
            let shader = args.opaque::<ShaderId>(1)?;
            state.attach_shader(*program, *shader);
            Ok(Return::Undefined)
        })
        .op("linkProgram", |state, args| {
            args.exactly(1)?;
            state.link_program(*args.opaque::<ProgramId>(0)?);
            Ok(Return::Undefined)
        })
        .op("getProgramParameter", |state, args| {
            args.exactly(2)?;
            let program = args.opaque::<ProgramId>(0)?;
            let pname = args.enum_value(1)?;
            let Some(record) = state.programs.get(&program.0) else {
                state.set_error(consts::INVALID_OPERATION);
                return Ok(Return::null());
            };
            Ok(match pname {
                consts::LINK_STATUS | consts::VALIDATE_STATUS => Return::boolean(record.linked),
                consts::DELETE_STATUS => Return::boolean(false),
                _ => {
                    state.set_error(consts::INVALID_ENUM);
                    Return::null()
                }
            })
        })
        .op("getProgramInfoLog", |state, args| {
            args.exactly(1)?;
            let program = args.opaque::<ProgramId>(0)?;
            Ok(match state.programs.get(&program.0) {
                Some(record) => Return::string(record.info_log.clone()),
                None => {
                    state.set_error(consts::INVALID_OPERATION);
                    Return::null()
                }
            })
        })
        .op("useProgram", |state, args| {
            args.exactly(1)?;
            let program = args.nullable_opaque::<ProgramId>(0)?;
            state.use_program(program.map(|p| *p));
            Ok(Return::Undefined)
        })
        .op("getAttribLocation", |state, args| {
            args.exactly(2)?;
            let program = args.opaque::<ProgramId>(0)?;
            let name = args.string(1)?;
            Ok(Return::number(state.attrib_location(*program, name) as f64))
        })
        .op("getUniformLocation", |state, args| {
            args.exactly(2)?;
            let program = args.opaque::<ProgramId>(0)?;
            let name = args.string(1)?;
            Ok(match state.uniform_location(*program, name) {
                Some(location) => Return::opaque(location),
                None => Return::null(),
            })
        })
        .op("uniformMatrix4fv", |state, args| {
            args.exactly(3)?;
            let location = args.nullable_opaque::<UniformLocation>(0)?;
            let _transpose = args.boolean(1)?;
            let values = args.f32_array(2)?;
            // A null location is silently ignored, as in GL.
            let Some(location) = location else {
                return Ok(Return::Undefined);
            };
            if values.len() != 16 {
                state.set_error(consts::INVALID_VALUE);
                return Ok(Return::Undefined);
            }
            state.set_uniform(&location, values);
            Ok(Return::Undefined)
        })
}

fn buffer_ops(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .op("createBuffer", |state, args| {
            args.exactly(0)?;
            Ok(Return::opaque(state.create_buffer()))
        })
        .op("bindBuffer", |state, args| {
            args.exactly(2)?;
            let target = args.enum_value(0)?;
            let buffer = args.nullable_opaque::<BufferId>(1)?;
            state.bind_buffer(target, buffer.map(|b| *b));
            Ok(Return::Undefined)
        })
        .op("bufferData", |state, args| {
            args.exactly(3)?;
            let target = args.enum_value(0)?;
            let data = args.view(1)?.bytes().to_vec();
            let usage = args.enum_value(2)?;
            state.buffer_data(target, data, usage);
            Ok(Return::Undefined)
        })
        .op("createTexture", |state, args| {
            args.exactly(0)?;
            Ok(Return::opaque(state.create_texture()))
        })
        .op("bindTexture", |state, args| {
            args.exactly(2)?;
            let target = args.enum_value(0)?;
            let texture = args.nullable_opaque::<TextureId>(1)?;
            state.bind_texture(target, texture.map(|t| *t));
            Ok(Return::Undefined)
        })
        .op("vertexAttribPointer", |state, args| {
            args.exactly(6)?;
            let index = args.enum_value(0)?;
            let pointer = crate::state::AttribPointer {
                size: args.integer(1)? as i32,
                element_type: args.enum_value(2)?,
                normalized: args.boolean(3)?,
                stride: args.integer(4)? as i32,
                offset: args.integer(5)?,
            };
            if !state.buffer_bindings.contains_key(&consts::ARRAY_BUFFER) {
                state.set_error(consts::INVALID_OPERATION);
                return Ok(Return::Undefined);
            }
            state.attrib_pointers.insert(index, pointer);
            Ok(Return::Undefined)
        })
        .op("enableVertexAttribArray", |state, args| {
            args.exactly(1)?;
            state.enabled_attribs.insert(args.enum_value(0)?);
            Ok(Return::Undefined)
        })
}

fn draw_ops(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .op("drawArrays", |state, args| {
            args.exactly(3)?;
            state.draw_arrays(
                args.enum_value(0)?,
                args.integer(1)? as i32,
                args.integer(2)? as i32,
            );
            Ok(Return::Undefined)
        })
        .op("drawElements", |state, args| {
            args.exactly(4)?;
            state.draw_elements(
                args.enum_value(0)?,
                args.integer(1)? as i32,
                args.enum_value(2)?,
                args.integer(3)?,
            );
            Ok(Return::Undefined)
        })
        .op("finish", |_, args| {
            args.exactly(0)?;
            Ok(Return::Undefined)
        })
        .op("flush", |_, args| {
            args.exactly(0)?;
            Ok(Return::Undefined)
        })
}

fn constants(builder: RegistryBuilder) -> RegistryBuilder {
    let table: &[(&str, u32)] = &[
        ("DEPTH_BUFFER_BIT", consts::DEPTH_BUFFER_BIT),
        ("STENCIL_BUFFER_BIT", consts::STENCIL_BUFFER_BIT),
        ("COLOR_BUFFER_BIT", consts::COLOR_BUFFER_BIT),
        ("POINTS", consts::POINTS),
        ("LINES", consts::LINES),
        ("LINE_LOOP", consts::LINE_LOOP),
        ("LINE_STRIP", consts::LINE_STRIP),
        ("TRIANGLES", consts::TRIANGLES),
        ("TRIANGLE_STRIP", consts::TRIANGLE_STRIP),
        ("TRIANGLE_FAN", consts::TRIANGLE_FAN),
        ("NO_ERROR", consts::NO_ERROR),
        ("INVALID_ENUM", consts::INVALID_ENUM),
        ("INVALID_VALUE", consts::INVALID_VALUE),
        ("INVALID_OPERATION", consts::INVALID_OPERATION),
        ("OUT_OF_MEMORY", consts::OUT_OF_MEMORY),
        ("CULL_FACE", consts::CULL_FACE),
        ("DEPTH_TEST", consts::DEPTH_TEST),
        ("SCISSOR_TEST", consts::SCISSOR_TEST),
        ("BLEND", consts::BLEND),
        ("VIEWPORT", consts::VIEWPORT),
        ("COLOR_CLEAR_VALUE", consts::COLOR_CLEAR_VALUE),
        ("BYTE", consts::BYTE),
        ("UNSIGNED_BYTE", consts::UNSIGNED_BYTE),
        ("SHORT", consts::SHORT),
        ("UNSIGNED_SHORT", consts::UNSIGNED_SHORT),
        ("INT", consts::INT),
        ("UNSIGNED_INT", consts::UNSIGNED_INT),
        ("FLOAT", consts::FLOAT),
        ("TEXTURE_2D", consts::TEXTURE_2D),
        ("TEXTURE0", consts::TEXTURE0),
        ("ACTIVE_TEXTURE", consts::ACTIVE_TEXTURE),
        ("ARRAY_BUFFER", consts::ARRAY_BUFFER),
        ("ELEMENT_ARRAY_BUFFER", consts::ELEMENT_ARRAY_BUFFER),
        ("STREAM_DRAW", consts::STREAM_DRAW),
        ("STATIC_DRAW", consts::STATIC_DRAW),
        ("DYNAMIC_DRAW", consts::DYNAMIC_DRAW),
        ("MAX_VERTEX_ATTRIBS", consts::MAX_VERTEX_ATTRIBS),
        ("FRAGMENT_SHADER", consts::FRAGMENT_SHADER),
        ("VERTEX_SHADER", consts::VERTEX_SHADER),
        ("SHADER_TYPE", consts::SHADER_TYPE),
        ("DELETE_STATUS", consts::DELETE_STATUS),
        ("COMPILE_STATUS", consts::COMPILE_STATUS),
        ("LINK_STATUS", consts::LINK_STATUS),
        ("VALIDATE_STATUS", consts::VALIDATE_STATUS),
        ("CURRENT_PROGRAM", consts::CURRENT_PROGRAM),
    ];
    table
        .iter()
        .fold(builder, |builder, (name, value)| {
            builder.constant(name, *value as f64)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Capability;
    use crate::value::{OpaqueValue, Primitive, Return, Value};

    const VS: &str =
        "attribute vec3 position;\nuniform mat4 projection;\nvoid main() { gl_Position = vec4(position, 1.0); }";
    const FS: &str = "void main() { gl_FragColor = vec4(1.0); }";

    fn opaque(ret: Return) -> OpaqueValue {
        match ret {
            Return::Opaque(value) => value,
            other => panic!("expected an opaque return, got {other:?}"),
        }
    }

    fn primitive(ret: Return) -> Primitive {
        match ret {
            Return::Primitive(p) => p,
            other => panic!("expected a primitive return, got {other:?}"),
        }
    }

    #[test]
    fn drawing_buffer_dimensions_are_operations_not_constants() {
        let mut cap = Capability::webgl();
        assert!(cap.registry.constant("drawingBufferWidth").is_none());
        assert!(cap
            .registry
            .op_names()
            .contains(&"drawingBufferWidth".to_string()));
        let ret = cap.invoke("drawingBufferWidth", vec![]).unwrap();
        assert_eq!(primitive(ret), Primitive::Number(300.0));
    }

    #[test]
    fn constants_are_numeric_glenum_values() {
        let cap = Capability::webgl();
        assert_eq!(cap.registry.constant("TRIANGLES"), Some(4.0));
        assert_eq!(cap.registry.constant("VERTEX_SHADER"), Some(0x8B31 as f64));
        assert_eq!(cap.registry.constant("COLOR_BUFFER_BIT"), Some(0x4000 as f64));
    }

    #[test]
    fn compile_and_link_protocol() {
        let mut cap = Capability::webgl();

        let vs = opaque(cap.invoke("createShader", vec![Value::Number(consts::VERTEX_SHADER as f64)]).unwrap());
        cap.invoke(
            "shaderSource",
            vec![Value::Opaque(vs.clone()), Value::Str(VS.into())],
        )
        .unwrap();
        cap.invoke("compileShader", vec![Value::Opaque(vs.clone())]).unwrap();
        let status = cap
            .invoke(
                "getShaderParameter",
                vec![
                    Value::Opaque(vs.clone()),
                    Value::Number(consts::COMPILE_STATUS as f64),
                ],
            )
            .unwrap();
        assert_eq!(primitive(status), Primitive::Bool(true));

        let fs = opaque(cap.invoke("createShader", vec![Value::Number(consts::FRAGMENT_SHADER as f64)]).unwrap());
        cap.invoke(
            "shaderSource",
            vec![Value::Opaque(fs.clone()), Value::Str(FS.into())],
        )
        .unwrap();
        cap.invoke("compileShader", vec![Value::Opaque(fs.clone())]).unwrap();

        let program = opaque(cap.invoke("createProgram", vec![]).unwrap());
        cap.invoke(
            "attachShader",
            vec![Value::Opaque(program.clone()), Value::Opaque(vs)],
        )
        .unwrap();
        cap.invoke(
            "attachShader",
            vec![Value::Opaque(program.clone()), Value::Opaque(fs)],
        )
        .unwrap();
        cap.invoke("linkProgram", vec![Value::Opaque(program.clone())]).unwrap();
        let linked = cap
            .invoke(
                "getProgramParameter",
                vec![
                    Value::Opaque(program.clone()),
                    Value::Number(consts::LINK_STATUS as f64),
                ],
            )
            .unwrap();
        assert_eq!(primitive(linked), Primitive::Bool(true));

        let location = cap
            .invoke(
                "getAttribLocation",
                vec![Value::Opaque(program.clone()), Value::Str("position".into())],
            )
            .unwrap();
        assert_eq!(primitive(location), Primitive::Number(0.0));

        cap.invoke("useProgram", vec![Value::Opaque(program)]).unwrap();
        cap.invoke(
            "drawArrays",
            vec![
                Value::Number(consts::TRIANGLES as f64),
                Value::Number(0.0),
                Value::Number(3.0),
            ],
        )
        .unwrap();
        assert_eq!(cap.state.draw_log.len(), 1);

        let error = cap.invoke("getError", vec![]).unwrap();
        assert_eq!(primitive(error), Primitive::Number(0.0));
    }

    #[test]
    fn failed_compile_reports_through_the_info_log() {
        let mut cap = Capability::webgl();
        let shader = opaque(
            cap.invoke("createShader", vec![Value::Number(consts::VERTEX_SHADER as f64)])
                .unwrap(),
        );
        cap.invoke(
            "shaderSource",
            vec![Value::Opaque(shader.clone()), Value::Str("garbage".into())],
        )
        .unwrap();
        cap.invoke("compileShader", vec![Value::Opaque(shader.clone())]).unwrap();
        let status = cap
            .invoke(
                "getShaderParameter",
                vec![
                    Value::Opaque(shader.clone()),
                    Value::Number(consts::COMPILE_STATUS as f64),
                ],
            )
            .unwrap();
        assert_eq!(primitive(status), Primitive::Bool(false));
        let log = cap
            .invoke("getShaderInfoLog", vec![Value::Opaque(shader)])
            .unwrap();
        match primitive(log) {
            Primitive::Str(log) => assert!(log.contains("void main")),
            other => panic!("unexpected log: {other:?}"),
        }
    }

    #[test]
    fn get_parameter_classifies_returns() {
        let mut cap = Capability::webgl();
        let viewport = cap
            .invoke("getParameter", vec![Value::Number(consts::VIEWPORT as f64)])
            .unwrap();
        assert!(matches!(viewport, Return::Opaque(_)));

        let current = cap
            .invoke(
                "getParameter",
                vec![Value::Number(consts::CURRENT_PROGRAM as f64)],
            )
            .unwrap();
        assert_eq!(primitive(current), Primitive::Null);

        let bad = cap
            .invoke("getParameter", vec![Value::Number(0.0)])
            .unwrap();
        assert_eq!(primitive(bad), Primitive::Null);
        let error = cap.invoke("getError", vec![]).unwrap();
        assert_eq!(primitive(error), Primitive::Number(consts::INVALID_ENUM as f64));
    }

    #[test]
    fn wrong_resource_type_is_an_argument_error() {
        let mut cap = Capability::webgl();
        let buffer = opaque(cap.invoke("createBuffer", vec![]).unwrap());
        let err = cap
            .invoke("compileShader", vec![Value::Opaque(buffer)])
            .unwrap_err();
        assert!(err.to_string().contains("argument 0"));
    }

    #[test]
    fn buffer_upload_via_typed_view() {
        use glint_proto::BufferKind;
        let mut cap = Capability::webgl();
        let buffer = opaque(cap.invoke("createBuffer", vec![]).unwrap());
        cap.invoke(
            "bindBuffer",
            vec![
                Value::Number(consts::ARRAY_BUFFER as f64),
                Value::Opaque(buffer),
            ],
        )
        .unwrap();
        let view = crate::value::TypedView::new(BufferKind::Float32, 1.0f32.to_le_bytes().to_vec())
            .unwrap();
        cap.invoke(
            "bufferData",
            vec![
                Value::Number(consts::ARRAY_BUFFER as f64),
                Value::View(view),
                Value::Number(consts::STATIC_DRAW as f64),
            ],
        )
        .unwrap();
        let record = cap.state.buffers.values().next().unwrap();
        assert_eq!(record.data, 1.0f32.to_le_bytes().to_vec());
        assert_eq!(cap.state.take_error(), consts::NO_ERROR);
    }
}

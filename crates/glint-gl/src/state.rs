//! State-tracking software GL context.
//!
//! Records resources, bindings, state and draw calls; nothing is
//! rasterized. GL-semantic misuse (bad enum, draw without a program)
//! sets the sticky error code instead of failing the invocation, the
//! way a real GL context reports it.

use indexmap::{IndexMap, IndexSet};

use crate::consts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Location of a uniform within a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLocation {
    pub program: ProgramId,
    pub name: String,
}

#[derive(Debug)]
pub struct ShaderRecord {
    pub kind: u32,
    pub source: String,
    pub compiled: bool,
    pub info_log: String,
    pub deleted: bool,
}

#[derive(Debug, Default)]
pub struct ProgramRecord {
    pub shaders: Vec<ShaderId>,
    pub linked: bool,
    pub info_log: String,
    /// Attribute name to location, assigned at link time.
    pub attribs: IndexMap<String, i32>,
    /// Uniform names discovered at link time.
    pub uniforms: IndexSet<String>,
    pub uniform_values: IndexMap<String, Vec<f32>>,
}

#[derive(Debug, Default)]
pub struct BufferRecord {
    pub data: Vec<u8>,
    pub usage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttribPointer {
    pub size: i32,
    pub element_type: u32,
    pub normalized: bool,
    pub stride: i32,
    pub offset: i64,
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Arrays {
        mode: u32,
        first: i32,
        count: i32,
    },
    Elements {
        mode: u32,
        count: i32,
        element_type: u32,
        offset: i64,
    },
}

#[derive(Debug)]
pub struct GlState {
    next_id: u32,
    pub shaders: IndexMap<u32, ShaderRecord>,
    pub programs: IndexMap<u32, ProgramRecord>,
    pub buffers: IndexMap<u32, BufferRecord>,
    pub textures: IndexSet<u32>,
    /// Buffer binding per target (ARRAY_BUFFER, ELEMENT_ARRAY_BUFFER).
    pub buffer_bindings: IndexMap<u32, u32>,
    pub texture_bindings: IndexMap<u32, u32>,
    pub clear_color: [f32; 4],
    pub viewport: [i32; 4],
    pub enabled: IndexSet<u32>,
    pub current_program: Option<ProgramId>,
    pub attrib_pointers: IndexMap<u32, AttribPointer>,
    pub enabled_attribs: IndexSet<u32>,
    pub draw_log: Vec<DrawCall>,
    pub drawing_buffer_width: f64,
    pub drawing_buffer_height: f64,
    error: u32,
}

impl Default for GlState {
    fn default() -> Self {
        Self::new()
    }
}

impl GlState {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            shaders: IndexMap::new(),
            programs: IndexMap::new(),
            buffers: IndexMap::new(),
            textures: IndexSet::new(),
            buffer_bindings: IndexMap::new(),
            texture_bindings: IndexMap::new(),
            clear_color: [0.0; 4],
            viewport: [0, 0, 300, 150],
            enabled: IndexSet::new(),
            current_program: None,
            attrib_pointers: IndexMap::new(),
            enabled_attribs: IndexSet::new(),
            draw_log: Vec::new(),
            drawing_buffer_width: 300.0,
            drawing_buffer_height: 150.0,
            error: consts::NO_ERROR,
        }
    }

    /// Record a GL error. The first unretrieved error wins.
    pub fn set_error(&mut self, code: u32) {
        if self.error == consts::NO_ERROR {
            self.error = code;
        }
    }

    /// Return and clear the sticky error code.
    pub fn take_error(&mut self) -> u32 {
        std::mem::replace(&mut self.error, consts::NO_ERROR)
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// `None` (a GL null object) for an invalid shader type enum.
    pub fn create_shader(&mut self, kind: u32) -> Option<ShaderId> {
        if kind != consts::VERTEX_SHADER && kind != consts::FRAGMENT_SHADER {
            self.set_error(consts::INVALID_ENUM);
            return None;
        }
        let id = self.alloc_id();
        self.shaders.insert(
            id,
            ShaderRecord {
                kind,
                source: String::new(),
                compiled: false,
                info_log: String::new(),
                deleted: false,
            },
        );
        Some(ShaderId(id))
    }

    pub fn shader_mut(&mut self, shader: ShaderId) -> Option<&mut ShaderRecord> {
        self.shaders.get_mut(&shader.0)
    }

    /// Syntactic "compilation": the source must mention a `void main`.
    pub fn compile_shader(&mut self, shader: ShaderId) {
        let Some(record) = self.shaders.get_mut(&shader.0) else {
            self.set_error(consts::INVALID_OPERATION);
            return;
        };
        if !record.source.trim().is_empty() && record.source.contains("void main") {
            record.compiled = true;
            record.info_log.clear();
        } else {
            record.compiled = false;
            record.info_log = "ERROR: no entry point 'void main' found".to_string();
        }
    }

    pub fn delete_shader(&mut self, shader: ShaderId) {
        if let Some(record) = self.shaders.get_mut(&shader.0) {
            record.deleted = true;
        }
    }

    pub fn create_program(&mut self) -> ProgramId {
        let id = self.alloc_id();
        self.programs.insert(id, ProgramRecord::default());
        ProgramId(id)
    }

    pub fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if !self.shaders.contains_key(&shader.0) {
            self.set_error(consts::INVALID_OPERATION);
            return;
        }
        let Some(record) = self.programs.get_mut(&program.0) else {
            self.set_error(consts::INVALID_OPERATION);
            return;
        };
        if record.shaders.contains(&shader) {
            self.set_error(consts::INVALID_OPERATION);
            return;
        }
        record.shaders.push(shader);
    }

    /// Link succeeds when a compiled vertex and a compiled fragment shader
    /// are attached; attribute and uniform locations come from scanning the
    /// shader sources for their declarations.
    pub fn link_program(&mut self, program: ProgramId) {
        let shaders = match self.programs.get(&program.0) {
            Some(record) => record.shaders.clone(),
            None => {
                self.set_error(consts::INVALID_OPERATION);
                return;
            }
        };

        let mut has_vertex = false;
        let mut has_fragment = false;
        let mut all_compiled = true;
        let mut attribs = IndexMap::new();
        let mut uniforms = IndexSet::new();
        for shader in &shaders {
            let Some(shader_record) = self.shaders.get(&shader.0) else {
                all_compiled = false;
                continue;
            };
            match shader_record.kind {
                consts::VERTEX_SHADER => has_vertex = true,
                consts::FRAGMENT_SHADER => has_fragment = true,
                _ => {}
            }
            all_compiled &= shader_record.compiled;
            scan_declarations(&shader_record.source, &mut attribs, &mut uniforms);
        }

        let Some(record) = self.programs.get_mut(&program.0) else {
            return;
        };
        if has_vertex && has_fragment && all_compiled {
            record.linked = true;
            record.info_log.clear();
            record.attribs = attribs;
            record.uniforms = uniforms;
        } else {
            record.linked = false;
            record.info_log =
                "ERROR: link requires one compiled vertex and one compiled fragment shader"
                    .to_string();
        }
    }

    pub fn use_program(&mut self, program: Option<ProgramId>) {
        match program {
            None => self.current_program = None,
            Some(program) => match self.programs.get(&program.0) {
                Some(record) if record.linked => self.current_program = Some(program),
                _ => self.set_error(consts::INVALID_OPERATION),
            },
        }
    }

    pub fn attrib_location(&mut self, program: ProgramId, name: &str) -> i32 {
        match self.programs.get(&program.0) {
            Some(record) if record.linked => {
                record.attribs.get(name).copied().unwrap_or(-1)
            }
            _ => {
                self.set_error(consts::INVALID_OPERATION);
                -1
            }
        }
    }

    pub fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        match self.programs.get(&program.0) {
            Some(record) if record.linked => {
                record.uniforms.contains(name).then(|| UniformLocation {
                    program,
                    name: name.to_string(),
                })
            }
            _ => {
                self.set_error(consts::INVALID_OPERATION);
                None
            }
        }
    }

    pub fn set_uniform(&mut self, location: &UniformLocation, values: Vec<f32>) {
        let Some(record) = self.programs.get_mut(&location.program.0) else {
            self.set_error(consts::INVALID_OPERATION);
            return;
        };
        record
            .uniform_values
            .insert(location.name.clone(), values);
    }

    pub fn create_buffer(&mut self) -> BufferId {
        let id = self.alloc_id();
        self.buffers.insert(id, BufferRecord::default());
        BufferId(id)
    }

    pub fn bind_buffer(&mut self, target: u32, buffer: Option<BufferId>) {
        if target != consts::ARRAY_BUFFER && target != consts::ELEMENT_ARRAY_BUFFER {
            self.set_error(consts::INVALID_ENUM);
            return;
        }
        match buffer {
            None => {
                self.buffer_bindings.shift_remove(&target);
            }
            Some(buffer) => {
                if !self.buffers.contains_key(&buffer.0) {
                    self.set_error(consts::INVALID_OPERATION);
                    return;
                }
                self.buffer_bindings.insert(target, buffer.0);
            }
        }
    }

    pub fn buffer_data(&mut self, target: u32, data: Vec<u8>, usage: u32) {
        if !matches!(
            usage,
            consts::STATIC_DRAW | consts::DYNAMIC_DRAW | consts::STREAM_DRAW
        ) {
            self.set_error(consts::INVALID_ENUM);
            return;
        }
        let Some(&bound) = self.buffer_bindings.get(&target) else {
            self.set_error(consts::INVALID_OPERATION);
            return;
        };
        let Some(record) = self.buffers.get_mut(&bound) else {
            self.set_error(consts::INVALID_OPERATION);
            return;
        };
        record.data = data;
        record.usage = usage;
    }

    pub fn create_texture(&mut self) -> TextureId {
        let id = self.alloc_id();
        self.textures.insert(id);
        TextureId(id)
    }

    pub fn bind_texture(&mut self, target: u32, texture: Option<TextureId>) {
        if target != consts::TEXTURE_2D {
            self.set_error(consts::INVALID_ENUM);
            return;
        }
        match texture {
            None => {
                self.texture_bindings.shift_remove(&target);
            }
            Some(texture) => {
                if !self.textures.contains(&texture.0) {
                    self.set_error(consts::INVALID_OPERATION);
                    return;
                }
                self.texture_bindings.insert(target, texture.0);
            }
        }
    }

    pub fn set_capability(&mut self, cap: u32, enabled: bool) {
        if !matches!(
            cap,
            consts::DEPTH_TEST | consts::BLEND | consts::CULL_FACE | consts::SCISSOR_TEST
        ) {
            self.set_error(consts::INVALID_ENUM);
            return;
        }
        if enabled {
            self.enabled.insert(cap);
        } else {
            self.enabled.shift_remove(&cap);
        }
    }

    pub fn clear(&mut self, mask: u32) {
        let known =
            consts::COLOR_BUFFER_BIT | consts::DEPTH_BUFFER_BIT | consts::STENCIL_BUFFER_BIT;
        if mask & !known != 0 {
            self.set_error(consts::INVALID_VALUE);
        }
    }

    fn valid_draw_mode(mode: u32) -> bool {
        mode <= consts::TRIANGLE_FAN
    }

    pub fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        if !Self::valid_draw_mode(mode) {
            self.set_error(consts::INVALID_ENUM);
            return;
        }
        if first < 0 || count < 0 {
            self.set_error(consts::INVALID_VALUE);
            return;
        }
        if self.current_program.is_none() {
            self.set_error(consts::INVALID_OPERATION);
            return;
        }
        self.draw_log.push(DrawCall::Arrays { mode, first, count });
    }

    pub fn draw_elements(&mut self, mode: u32, count: i32, element_type: u32, offset: i64) {
        if !Self::valid_draw_mode(mode)
            || !matches!(
                element_type,
                consts::UNSIGNED_BYTE | consts::UNSIGNED_SHORT | consts::UNSIGNED_INT
            )
        {
            self.set_error(consts::INVALID_ENUM);
            return;
        }
        if count < 0 || offset < 0 {
            self.set_error(consts::INVALID_VALUE);
            return;
        }
        if self.current_program.is_none()
            || !self
                .buffer_bindings
                .contains_key(&consts::ELEMENT_ARRAY_BUFFER)
        {
            self.set_error(consts::INVALID_OPERATION);
            return;
        }
        self.draw_log.push(DrawCall::Elements {
            mode,
            count,
            element_type,
            offset,
        });
    }
}

/// Pull `attribute`/`uniform` declarations out of a GLSL source.
///
/// Good enough for the `attribute vec3 position;` shape the bridge's
/// clients write; attribute locations are assigned in declaration order.
fn scan_declarations(
    source: &str,
    attribs: &mut IndexMap<String, i32>,
    uniforms: &mut IndexSet<String>,
) {
    for line in source.lines() {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let qualifier = words.next();
        let _type = words.next();
        let Some(name) = words.next() else { continue };
        let name = name.trim_end_matches(';');
        if name.is_empty() {
            continue;
        }
        match qualifier {
            Some("attribute") => {
                if !attribs.contains_key(name) {
                    let next = attribs.len() as i32;
                    attribs.insert(name.to_string(), next);
                }
            }
            Some("uniform") => {
                uniforms.insert(name.to_string());
            }
            _ => {}
        }
    }
}

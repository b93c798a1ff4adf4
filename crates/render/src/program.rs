use std::rc::Rc;

use glam::Mat4;

use crate::context::{GraphicsContext, ProgramId, ProgramSource};
use crate::error::RenderError;

/// Compiled and linked vertex + fragment program.
pub struct ShaderProgram {
    ctx: Rc<dyn GraphicsContext>,
    id: ProgramId,
}

impl ShaderProgram {
    pub fn new(ctx: Rc<dyn GraphicsContext>, source: &ProgramSource<'_>) -> Result<Self, RenderError> {
        let id = ctx.create_program(source)?;
        tracing::debug!(label = source.label, ?id, "shader program linked");
        Ok(Self { ctx, id })
    }

    pub fn use_program(&self) {
        self.ctx.use_program(Some(self.id));
    }

    pub fn set_uniform_mat4(&self, name: &str, value: &Mat4) {
        self.ctx.set_uniform_mat4(self.id, name, value);
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        self.ctx.delete_program(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShaderStage;
    use crate::recording::RecordingContext;
    use crate::shaders;

    #[test]
    fn uniforms_are_stored_per_program() {
        let rec = Rc::new(RecordingContext::new());
        let program = ShaderProgram::new(rec.clone(), &shaders::INSTANCED_CUBE).unwrap();
        let view = Mat4::from_translation(glam::Vec3::new(0.0, 0.0, 3.0));
        program.set_uniform_mat4("view", &view);
        program.set_uniform_mat4("missing", &Mat4::IDENTITY);

        assert_eq!(rec.uniform(program.id(), "view"), Some(view));
        assert_eq!(rec.uniform(program.id(), "missing"), None);
        assert_eq!(rec.program_label(program.id()).as_deref(), Some("instanced-cube"));
    }

    #[test]
    fn empty_fragment_stage_reports_stage() {
        let rec = Rc::new(RecordingContext::new());
        let source = ProgramSource {
            fragment: "",
            ..shaders::INSTANCED_CUBE
        };
        let err = ShaderProgram::new(rec, &source).err().unwrap();
        match err {
            RenderError::ShaderCompile { stage, .. } => assert_eq!(stage, ShaderStage::Fragment),
            other => panic!("unexpected error: {other}"),
        }
    }
}

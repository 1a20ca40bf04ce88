//! Shader programs and their uniform state.
//!
//! Programs behave like GL program objects: uniforms are set by name and
//! stick to the program, and one program is "in use" per device. Draws
//! snapshot the uniforms of the program in use.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use corelib::handles::ProgramId;
use glam::{Mat4, Vec3};
use slotmap::SlotMap;

pub const PROJECTION: &str = "projection";
pub const VIEW: &str = "view";
pub const MODEL: &str = "model";
pub const TEXTURE1: &str = "texture1";
pub const MATERIAL_AMBIENT: &str = "material.ambient";
pub const MATERIAL_DIFFUSE: &str = "material.diffuse";
pub const MATERIAL_SPECULAR: &str = "material.specular";
pub const MATERIAL_SHININESS: &str = "material.shininess";
pub const LINE_COLOR: &str = "lineColor";

pub trait ShaderProgram {
    fn id(&self) -> ProgramId;

    /// Make this the program subsequent draws use.
    fn use_program(&mut self);

    fn set_mat4(&mut self, name: &str, value: Mat4);
    fn set_int(&mut self, name: &str, value: i32);
    fn set_vec3(&mut self, name: &str, value: Vec3);
    fn set_float(&mut self, name: &str, value: f32);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Int(i32),
    Vec3(Vec3),
    Float(f32),
}

/// Named uniform values of one program.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UniformBlock {
    values: BTreeMap<String, UniformValue>,
}

impl UniformBlock {
    pub fn set(&mut self, name: &str, value: UniformValue) {
        match self.values.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.values.insert(name.to_owned(), value);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.values.get(name).copied()
    }

    pub fn mat4(&self, name: &str) -> Option<Mat4> {
        match self.get(name)? {
            UniformValue::Mat4(m) => Some(m),
            _ => None,
        }
    }

    pub fn vec3(&self, name: &str) -> Option<Vec3> {
        match self.get(name)? {
            UniformValue::Vec3(v) => Some(v),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            UniformValue::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            UniformValue::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Every live program of a device plus the one in use.
#[derive(Debug, Default)]
pub struct ProgramTable {
    current: Option<ProgramId>,
    programs: SlotMap<ProgramId, UniformBlock>,
}

pub type SharedPrograms = Rc<RefCell<ProgramTable>>;

impl ProgramTable {
    pub fn shared() -> SharedPrograms {
        Rc::new(RefCell::new(Self::default()))
    }

    /// Register a new program in `table` and hand out its owning handle.
    pub fn create(table: &SharedPrograms, label: &str) -> ProgramHandle {
        let id = table.borrow_mut().programs.insert(UniformBlock::default());
        log::debug!("Created shader program '{}' ({:?})", label, id);
        ProgramHandle {
            id,
            label: label.to_owned(),
            table: Rc::clone(table),
        }
    }

    pub fn current(&self) -> Option<ProgramId> {
        self.current
    }

    /// The program in use and its uniforms.
    pub fn current_block(&self) -> Option<(ProgramId, &UniformBlock)> {
        let id = self.current?;
        self.programs.get(id).map(|block| (id, block))
    }

    pub fn block(&self, id: ProgramId) -> Option<&UniformBlock> {
        self.programs.get(id)
    }

    pub fn live_count(&self) -> usize {
        self.programs.len()
    }
}

/// Owning handle to a program in a [`ProgramTable`]; dropping it deletes
/// the program.
#[derive(Debug)]
pub struct ProgramHandle {
    id: ProgramId,
    label: String,
    table: SharedPrograms,
}

impl ProgramHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    fn set(&mut self, name: &str, value: UniformValue) {
        let mut table = self.table.borrow_mut();
        match table.programs.get_mut(self.id) {
            Some(block) => block.set(name, value),
            None => log::warn!("Uniform '{}' set on deleted program '{}'", name, self.label),
        }
    }
}

impl ShaderProgram for ProgramHandle {
    fn id(&self) -> ProgramId {
        self.id
    }

    fn use_program(&mut self) {
        self.table.borrow_mut().current = Some(self.id);
    }

    fn set_mat4(&mut self, name: &str, value: Mat4) {
        self.set(name, UniformValue::Mat4(value));
    }

    fn set_int(&mut self, name: &str, value: i32) {
        self.set(name, UniformValue::Int(value));
    }

    fn set_vec3(&mut self, name: &str, value: Vec3) {
        self.set(name, UniformValue::Vec3(value));
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.set(name, UniformValue::Float(value));
    }
}

impl Drop for ProgramHandle {
    fn drop(&mut self) {
        let mut table = self.table.borrow_mut();
        table.programs.remove(self.id);
        if table.current == Some(self.id) {
            table.current = None;
        }
        log::debug!("Deleted shader program '{}'", self.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_stick_to_their_program() {
        let table = ProgramTable::shared();
        let mut a = ProgramTable::create(&table, "a");
        let mut b = ProgramTable::create(&table, "b");

        a.set_int(TEXTURE1, 0);
        b.set_float(MATERIAL_SHININESS, 32.0);
        b.set_float(MATERIAL_SHININESS, 64.0);

        let t = table.borrow();
        assert_eq!(t.block(a.id()).and_then(|u| u.int(TEXTURE1)), Some(0));
        assert_eq!(t.block(a.id()).and_then(|u| u.float(MATERIAL_SHININESS)), None);
        assert_eq!(t.block(b.id()).and_then(|u| u.float(MATERIAL_SHININESS)), Some(64.0));
        assert_eq!(t.block(b.id()).map(UniformBlock::len), Some(1));
    }

    #[test]
    fn use_program_selects_current_block() {
        let table = ProgramTable::shared();
        let mut program = ProgramTable::create(&table, "model");
        assert!(table.borrow().current_block().is_none());

        program.set_vec3(MATERIAL_DIFFUSE, Vec3::new(1.0, 0.5, 0.25));
        program.use_program();

        let t = table.borrow();
        let (id, block) = t.current_block().expect("program in use");
        assert_eq!(id, program.id());
        assert_eq!(block.vec3(MATERIAL_DIFFUSE), Some(Vec3::new(1.0, 0.5, 0.25)));
    }

    #[test]
    fn typed_getters_reject_mismatched_kinds() {
        let mut block = UniformBlock::default();
        block.set(MODEL, UniformValue::Mat4(Mat4::IDENTITY));
        assert_eq!(block.mat4(MODEL), Some(Mat4::IDENTITY));
        assert_eq!(block.vec3(MODEL), None);
        assert_eq!(block.names().collect::<Vec<_>>(), vec![MODEL]);
    }

    #[test]
    fn dropping_the_handle_deletes_the_program() {
        let table = ProgramTable::shared();
        let mut program = ProgramTable::create(&table, "model");
        program.use_program();
        assert_eq!(table.borrow().live_count(), 1);

        drop(program);
        assert_eq!(table.borrow().live_count(), 0);
        assert!(table.borrow().current().is_none());
    }
}

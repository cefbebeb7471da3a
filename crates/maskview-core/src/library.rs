use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::element::Element;
use crate::geometry::BBox;

/// A named, reusable collection of elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub name: String,
    pub elements: Vec<Element>,
}

impl Structure {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            elements: Vec::new(),
        }
    }

    pub fn with_elements(name: &str, elements: Vec<Element>) -> Self {
        Self {
            name: name.to_string(),
            elements,
        }
    }

    pub fn add_element(&mut self, element: Element) {
        self.elements.push(element);
    }

    /// Bounding box of this structure's own non-reference elements.
    pub fn local_bbox(&self) -> Option<BBox> {
        BBox::union_all(self.elements.iter().filter_map(|e| e.bounds()))
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn reference_count(&self) -> usize {
        self.elements.iter().filter(|e| e.is_reference()).count()
    }
}

/// The top-level container of named structures plus unit metadata.
///
/// Produced once by the external decoder and treated as read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub id: Uuid,
    pub name: String,
    /// User units per database unit.
    pub user_units_per_db_unit: f64,
    /// Meters per database unit.
    pub meters_per_db_unit: f64,
    structures: Vec<Structure>,
    #[serde(skip)]
    name_index: HashMap<String, usize>,
}

impl Library {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            user_units_per_db_unit: 1e-3,
            meters_per_db_unit: 1e-9,
            structures: Vec::new(),
            name_index: HashMap::new(),
        }
    }

    pub fn add_structure(&mut self, structure: Structure) {
        self.name_index
            .insert(structure.name.clone(), self.structures.len());
        self.structures.push(structure);
    }

    pub fn structure(&self, name: &str) -> Option<&Structure> {
        self.name_index
            .get(name)
            .map(|&i| &self.structures[i])
            .or_else(|| self.structures.iter().find(|s| s.name == name))
    }

    pub fn structure_index(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied().or_else(|| {
            self.structures.iter().position(|s| s.name == name)
        })
    }

    pub fn structure_at(&self, index: usize) -> Option<&Structure> {
        self.structures.get(index)
    }

    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    pub fn structure_names(&self) -> Vec<&str> {
        self.structures.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    /// The default structure to resolve from: the first one that is not
    /// referenced by any other structure, falling back to the first overall.
    pub fn top_structure(&self) -> Option<&Structure> {
        let mut referenced: Vec<&str> = Vec::new();
        for s in &self.structures {
            for e in &s.elements {
                match e {
                    Element::SingleRef(r) => referenced.push(r.structure.as_str()),
                    Element::GridRef(r) => referenced.push(r.structure.as_str()),
                    _ => {}
                }
            }
        }
        self.structures
            .iter()
            .find(|s| !referenced.contains(&s.name.as_str()))
            .or_else(|| self.structures.first())
    }

    // ── Serialization ────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut lib: Library = serde_json::from_str(json)?;
        lib.rebuild_index();
        Ok(lib)
    }

    fn rebuild_index(&mut self) {
        self.name_index = self
            .structures
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
    }
}

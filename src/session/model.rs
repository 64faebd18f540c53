use crate::backend::Person;
use serde::Serialize;
use std::collections::HashMap;

/// One row of the present-students panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentStudent {
    pub id: String,
    /// Resolved name, or the id while the lookup is pending or failed
    pub name: String,
}

/// Present student ids in backend order, with names filled in by a
/// separate batch lookup.
#[derive(Debug, Clone, Default)]
pub struct AttendanceRoster {
    ids: Vec<String>,
    names: HashMap<String, String>,
}

impl AttendanceRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the id list. Returns ids whose names are still unknown, empty when nothing changed.
    pub fn replace(&mut self, ids: Vec<String>) -> Vec<String> {
        if ids == self.ids {
            return Vec::new();
        }
        self.ids = ids;
        self.ids
            .iter()
            .filter(|id| !self.names.contains_key(*id))
            .cloned()
            .collect()
    }

    pub fn set_names(&mut self, people: &[Person]) {
        for person in people {
            let name = person.display_name();
            if !name.is_empty() {
                self.names.insert(person.id.clone(), name);
            }
        }
    }

    /// Remember a name seen on a recognition result
    pub fn learn_name(&mut self, id: &str, name: &str) {
        if !name.trim().is_empty() {
            self.names.entry(id.to_string()).or_insert_with(|| name.trim().to_string());
        }
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|present| present == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn entries(&self) -> Vec<PresentStudent> {
        self.ids
            .iter()
            .map(|id| PresentStudent {
                id: id.clone(),
                name: self.names.get(id).cloned().unwrap_or_else(|| id.clone()),
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.names.clear();
    }
}

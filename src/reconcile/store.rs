//! Directory store seam and the in-memory implementation used by the
//! service and the tests.

use crate::core::error::PersistenceError;
use crate::types::FieldMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollegeRecord {
    pub id: i64,
    pub name: String,
    pub fields: FieldMap,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepartmentRecord {
    pub id: i64,
    pub name: String,
    pub fields: FieldMap,
}

/// A department as attached to one college (CollegeDepartment joined with Department).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollegeDepartmentView {
    pub college_department_id: i64,
    pub college_id: i64,
    pub department_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgramRecord {
    pub id: i64,
    pub name: String,
    pub level: String,
    pub fields: FieldMap,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgramTermRecord {
    pub id: i64,
    pub program_id: i64,
    pub college_id: i64,
    pub fields: FieldMap,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgramLink {
    pub id: i64,
    pub program_id: i64,
    pub college_id: i64,
    pub college_department_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDepartment {
    pub department_id: i64,
    pub college_department_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewProgram {
    pub program_id: i64,
    pub term_id: i64,
    pub link_id: Option<i64>,
}

/// Relational directory: College, Department + CollegeDepartment, Program +
/// ProgramTermDetails, ProgramDepartmentLink.
///
/// Implementations must reject a ProgramDepartmentLink whose
/// CollegeDepartmentID belongs to a different college than the link's CollegeID.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Exact, case-insensitive, whitespace-trimmed name lookup.
    async fn find_college_by_name(&self, name: &str)
        -> Result<Option<CollegeRecord>, PersistenceError>;
    async fn get_college(&self, id: i64) -> Result<Option<CollegeRecord>, PersistenceError>;
    async fn list_colleges(&self) -> Result<Vec<CollegeRecord>, PersistenceError>;
    async fn insert_college(&self, fields: &FieldMap) -> Result<i64, PersistenceError>;
    async fn update_college(&self, id: i64, fields: &FieldMap) -> Result<(), PersistenceError>;

    async fn insert_department(
        &self,
        college_id: i64,
        fields: &FieldMap,
    ) -> Result<NewDepartment, PersistenceError>;
    /// Departments of one college, or of every college when `college_id` is `None`.
    async fn list_college_departments(
        &self,
        college_id: Option<i64>,
    ) -> Result<Vec<CollegeDepartmentView>, PersistenceError>;
    async fn get_college_department(
        &self,
        college_department_id: i64,
    ) -> Result<Option<CollegeDepartmentView>, PersistenceError>;

    /// Program, its ProgramTermDetails row and the optional department link,
    /// committed together or not at all.
    async fn insert_program(
        &self,
        college_id: i64,
        fields: &FieldMap,
        college_department_id: Option<i64>,
    ) -> Result<NewProgram, PersistenceError>;
    /// Programs with term details at `college_id`.
    async fn list_programs(&self, college_id: i64) -> Result<Vec<ProgramRecord>, PersistenceError>;

    async fn list_program_links(&self, program_id: i64)
        -> Result<Vec<ProgramLink>, PersistenceError>;
    async fn insert_program_link(
        &self,
        program_id: i64,
        college_id: i64,
        college_department_id: i64,
    ) -> Result<i64, PersistenceError>;
    async fn update_program_link(
        &self,
        link_id: i64,
        college_department_id: i64,
    ) -> Result<(), PersistenceError>;
    async fn delete_program_link(&self, link_id: i64) -> Result<(), PersistenceError>;
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    colleges: Vec<CollegeRecord>,
    departments: Vec<DepartmentRecord>,
    college_departments: Vec<(i64, i64, i64)>,
    programs: Vec<ProgramRecord>,
    program_terms: Vec<ProgramTermRecord>,
    program_links: Vec<ProgramLink>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn college_exists(&self, id: i64) -> bool {
        self.colleges.iter().any(|c| c.id == id)
    }

    fn college_department(&self, id: i64) -> Option<CollegeDepartmentView> {
        let (cd_id, college_id, department_id) = *self
            .college_departments
            .iter()
            .find(|(cd_id, _, _)| *cd_id == id)?;
        let name = self
            .departments
            .iter()
            .find(|d| d.id == department_id)
            .map(|d| d.name.clone())
            .unwrap_or_default();
        Some(CollegeDepartmentView {
            college_department_id: cd_id,
            college_id,
            department_id,
            name,
        })
    }

    /// Foreign keys plus the same-college rule for ProgramDepartmentLink rows.
    fn check_link(
        &self,
        operation: &str,
        program_id: i64,
        college_id: i64,
        college_department_id: i64,
    ) -> Result<(), PersistenceError> {
        if !self.programs.iter().any(|p| p.id == program_id) {
            return Err(PersistenceError::new(
                "ProgramDepartmentLink",
                operation,
                format!("ProgramID {} does not exist", program_id),
            ));
        }
        self.check_link_department(operation, college_id, college_department_id)
    }

    fn check_link_department(
        &self,
        operation: &str,
        college_id: i64,
        college_department_id: i64,
    ) -> Result<(), PersistenceError> {
        let Some(cd) = self.college_department(college_department_id) else {
            return Err(PersistenceError::new(
                "ProgramDepartmentLink",
                operation,
                format!("CollegeDepartmentID {} does not exist", college_department_id),
            ));
        };
        if cd.college_id != college_id {
            return Err(PersistenceError::new(
                "ProgramDepartmentLink",
                operation,
                format!(
                    "CollegeDepartmentID {} belongs to college {}, not {}",
                    college_department_id, cd.college_id, college_id
                ),
            ));
        }
        Ok(())
    }
}

fn field_value(fields: &FieldMap, key: &str) -> String {
    fields.get(key).map(|v| v.trim().to_string()).unwrap_or_default()
}

/// `DirectoryStore` over in-process tables behind a single `RwLock`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
    failing_tables: DashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, simulating a lost database connection.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make writes to one table fail while the rest of the store keeps working.
    pub fn set_fail_table(&self, table: &str, fail: bool) {
        if fail {
            self.failing_tables.insert(table.to_string());
        } else {
            self.failing_tables.remove(table);
        }
    }

    fn check_writable(&self, table: &str, operation: &str) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) || self.failing_tables.contains(table) {
            return Err(PersistenceError::new(table, operation, "store is unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn find_college_by_name(
        &self,
        name: &str,
    ) -> Result<Option<CollegeRecord>, PersistenceError> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }
        let tables = self.tables.read().await;
        Ok(tables
            .colleges
            .iter()
            .find(|c| c.name.trim().to_lowercase() == wanted)
            .cloned())
    }

    async fn get_college(&self, id: i64) -> Result<Option<CollegeRecord>, PersistenceError> {
        let tables = self.tables.read().await;
        Ok(tables.colleges.iter().find(|c| c.id == id).cloned())
    }

    async fn list_colleges(&self) -> Result<Vec<CollegeRecord>, PersistenceError> {
        Ok(self.tables.read().await.colleges.clone())
    }

    async fn insert_college(&self, fields: &FieldMap) -> Result<i64, PersistenceError> {
        self.check_writable("College", "insert")?;
        let name = field_value(fields, "CollegeName");
        if name.is_empty() {
            return Err(PersistenceError::new("College", "insert", "CollegeName is required"));
        }
        let mut tables = self.tables.write().await;
        let id = tables.allocate_id();
        tables.colleges.push(CollegeRecord {
            id,
            name,
            fields: fields.clone(),
        });
        Ok(id)
    }

    async fn update_college(&self, id: i64, fields: &FieldMap) -> Result<(), PersistenceError> {
        self.check_writable("College", "update")?;
        let mut tables = self.tables.write().await;
        let Some(college) = tables.colleges.iter_mut().find(|c| c.id == id) else {
            return Err(PersistenceError::new(
                "College",
                "update",
                format!("CollegeID {} does not exist", id),
            ));
        };
        for (k, v) in fields {
            college.fields.insert(k.clone(), v.clone());
        }
        let name = field_value(fields, "CollegeName");
        if !name.is_empty() {
            college.name = name;
        }
        Ok(())
    }

    async fn insert_department(
        &self,
        college_id: i64,
        fields: &FieldMap,
    ) -> Result<NewDepartment, PersistenceError> {
        self.check_writable("Department", "insert")?;
        let name = field_value(fields, "DepartmentName");
        if name.is_empty() {
            return Err(PersistenceError::new(
                "Department",
                "insert",
                "DepartmentName is required",
            ));
        }
        let mut tables = self.tables.write().await;
        if !tables.college_exists(college_id) {
            return Err(PersistenceError::new(
                "CollegeDepartment",
                "insert",
                format!("CollegeID {} does not exist", college_id),
            ));
        }
        let department_id = tables.allocate_id();
        tables.departments.push(DepartmentRecord {
            id: department_id,
            name,
            fields: fields.clone(),
        });
        let college_department_id = tables.allocate_id();
        tables
            .college_departments
            .push((college_department_id, college_id, department_id));
        Ok(NewDepartment {
            department_id,
            college_department_id,
        })
    }

    async fn list_college_departments(
        &self,
        college_id: Option<i64>,
    ) -> Result<Vec<CollegeDepartmentView>, PersistenceError> {
        let tables = self.tables.read().await;
        Ok(tables
            .college_departments
            .iter()
            .filter(|(_, cid, _)| college_id.map(|wanted| wanted == *cid).unwrap_or(true))
            .filter_map(|(cd_id, _, _)| tables.college_department(*cd_id))
            .collect())
    }

    async fn get_college_department(
        &self,
        college_department_id: i64,
    ) -> Result<Option<CollegeDepartmentView>, PersistenceError> {
        Ok(self
            .tables
            .read()
            .await
            .college_department(college_department_id))
    }

    async fn insert_program(
        &self,
        college_id: i64,
        fields: &FieldMap,
        college_department_id: Option<i64>,
    ) -> Result<NewProgram, PersistenceError> {
        self.check_writable("Program", "insert")?;
        self.check_writable("ProgramTermDetails", "insert")?;
        if college_department_id.is_some() {
            self.check_writable("ProgramDepartmentLink", "insert")?;
        }
        let name = field_value(fields, "ProgramName");
        if name.is_empty() {
            return Err(PersistenceError::new("Program", "insert", "ProgramName is required"));
        }
        // Every check runs before the first row is pushed.
        let mut tables = self.tables.write().await;
        if !tables.college_exists(college_id) {
            return Err(PersistenceError::new(
                "ProgramTermDetails",
                "insert",
                format!("CollegeID {} does not exist", college_id),
            ));
        }
        if let Some(cd_id) = college_department_id {
            tables.check_link_department("insert", college_id, cd_id)?;
        }
        let program_id = tables.allocate_id();
        tables.programs.push(ProgramRecord {
            id: program_id,
            name,
            level: field_value(fields, "Level"),
            fields: fields.clone(),
        });
        let term_id = tables.allocate_id();
        tables.program_terms.push(ProgramTermRecord {
            id: term_id,
            program_id,
            college_id,
            fields: fields.clone(),
        });
        let link_id = college_department_id.map(|cd_id| {
            let id = tables.allocate_id();
            tables.program_links.push(ProgramLink {
                id,
                program_id,
                college_id,
                college_department_id: cd_id,
            });
            id
        });
        Ok(NewProgram {
            program_id,
            term_id,
            link_id,
        })
    }

    async fn list_programs(&self, college_id: i64) -> Result<Vec<ProgramRecord>, PersistenceError> {
        let tables = self.tables.read().await;
        let mut out: Vec<ProgramRecord> = Vec::new();
        for term in tables.program_terms.iter().filter(|t| t.college_id == college_id) {
            if out.iter().any(|p| p.id == term.program_id) {
                continue;
            }
            if let Some(p) = tables.programs.iter().find(|p| p.id == term.program_id) {
                out.push(p.clone());
            }
        }
        Ok(out)
    }

    async fn list_program_links(
        &self,
        program_id: i64,
    ) -> Result<Vec<ProgramLink>, PersistenceError> {
        let tables = self.tables.read().await;
        Ok(tables
            .program_links
            .iter()
            .filter(|l| l.program_id == program_id)
            .cloned()
            .collect())
    }

    async fn insert_program_link(
        &self,
        program_id: i64,
        college_id: i64,
        college_department_id: i64,
    ) -> Result<i64, PersistenceError> {
        self.check_writable("ProgramDepartmentLink", "insert")?;
        let mut tables = self.tables.write().await;
        tables.check_link("insert", program_id, college_id, college_department_id)?;
        let id = tables.allocate_id();
        tables.program_links.push(ProgramLink {
            id,
            program_id,
            college_id,
            college_department_id,
        });
        Ok(id)
    }

    async fn update_program_link(
        &self,
        link_id: i64,
        college_department_id: i64,
    ) -> Result<(), PersistenceError> {
        self.check_writable("ProgramDepartmentLink", "update")?;
        let mut tables = self.tables.write().await;
        let Some(link) = tables.program_links.iter().find(|l| l.id == link_id).cloned() else {
            return Err(PersistenceError::new(
                "ProgramDepartmentLink",
                "update",
                format!("LinkID {} does not exist", link_id),
            ));
        };
        tables.check_link("update", link.program_id, link.college_id, college_department_id)?;
        if let Some(row) = tables.program_links.iter_mut().find(|l| l.id == link_id) {
            row.college_department_id = college_department_id;
        }
        Ok(())
    }

    async fn delete_program_link(&self, link_id: i64) -> Result<(), PersistenceError> {
        self.check_writable("ProgramDepartmentLink", "delete")?;
        let mut tables = self.tables.write().await;
        let before = tables.program_links.len();
        tables.program_links.retain(|l| l.id != link_id);
        if tables.program_links.len() == before {
            return Err(PersistenceError::new(
                "ProgramDepartmentLink",
                "delete",
                format!("LinkID {} does not exist", link_id),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_college_lookup_is_case_insensitive_exact() {
        let store = MemoryStore::new();
        let id = store
            .insert_college(&fields(&[("CollegeName", "MIT")]))
            .await
            .unwrap();
        let found = store.find_college_by_name("  mit ").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(id));
        assert!(store.find_college_by_name("M.I.T.").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cross_college_link_is_rejected() {
        let store = MemoryStore::new();
        let a = store.insert_college(&fields(&[("CollegeName", "A")])).await.unwrap();
        let b = store.insert_college(&fields(&[("CollegeName", "B")])).await.unwrap();
        let dept_b = store
            .insert_department(b, &fields(&[("DepartmentName", "Graduate Admissions")]))
            .await
            .unwrap();
        let program = store
            .insert_program(a, &fields(&[("ProgramName", "MS in CS"), ("Level", "Master's")]), None)
            .await
            .unwrap();

        let err = store
            .insert_program_link(program.program_id, a, dept_b.college_department_id)
            .await
            .unwrap_err();
        assert_eq!(err.table, "ProgramDepartmentLink");
        assert!(err.message.contains("belongs to college"));
        assert!(store
            .list_program_links(program.program_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_foreign_keys_and_listing() {
        let store = MemoryStore::new();
        let err = store
            .insert_department(99, &fields(&[("DepartmentName", "Admissions")]))
            .await
            .unwrap_err();
        assert_eq!(err.table, "CollegeDepartment");

        let a = store.insert_college(&fields(&[("CollegeName", "A")])).await.unwrap();
        let d = store
            .insert_department(a, &fields(&[("DepartmentName", "Admissions")]))
            .await
            .unwrap();
        let views = store.list_college_departments(Some(a)).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].name, "Admissions");
        assert_eq!(views[0].college_department_id, d.college_department_id);
        assert!(store.list_college_departments(Some(a + 100)).await.unwrap().is_empty());

        let p = store
            .insert_program(a, &fields(&[("ProgramName", "BA History"), ("Level", "Bachelor")]), None)
            .await
            .unwrap();
        let programs = store.list_programs(a).await.unwrap();
        assert_eq!(programs[0].level, "Bachelor");
        let link = store
            .insert_program_link(p.program_id, a, d.college_department_id)
            .await
            .unwrap();
        store.delete_program_link(link).await.unwrap();
        assert!(store.delete_program_link(link).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_writes_report_table() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let err = store
            .insert_college(&fields(&[("CollegeName", "A")]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "insert on College failed: store is unavailable");
    }

    #[tokio::test]
    async fn test_program_bundle_is_all_or_nothing() {
        let store = MemoryStore::new();
        let a = store.insert_college(&fields(&[("CollegeName", "A")])).await.unwrap();
        let b = store.insert_college(&fields(&[("CollegeName", "B")])).await.unwrap();
        let dept_a = store
            .insert_department(a, &fields(&[("DepartmentName", "Graduate Admissions")]))
            .await
            .unwrap();
        let dept_b = store
            .insert_department(b, &fields(&[("DepartmentName", "Graduate Admissions")]))
            .await
            .unwrap();
        let program = fields(&[("ProgramName", "MS in CS"), ("Level", "Master's")]);

        let err = store
            .insert_program(a, &program, Some(dept_b.college_department_id))
            .await
            .unwrap_err();
        assert_eq!(err.table, "ProgramDepartmentLink");
        assert!(store.list_programs(a).await.unwrap().is_empty());

        store.set_fail_table("ProgramDepartmentLink", true);
        assert!(store
            .insert_program(a, &program, Some(dept_a.college_department_id))
            .await
            .is_err());
        assert!(store.list_programs(a).await.unwrap().is_empty());

        store.set_fail_table("ProgramDepartmentLink", false);
        let created = store
            .insert_program(a, &program, Some(dept_a.college_department_id))
            .await
            .unwrap();
        let links = store.list_program_links(created.program_id).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(Some(links[0].id), created.link_id);
        assert_eq!(store.list_programs(a).await.unwrap().len(), 1);
    }
}

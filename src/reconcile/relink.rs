//! Repair pass: point every program of a college at the admissions office
//! that matches its level.

use super::level::{classify_level, is_compatible};
use super::matcher::{eligible_departments, generic_admissions_match, level_inferred_match};
use super::store::DirectoryStore;
use crate::core::error::PersistenceError;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelinkStats {
    pub processed: usize,
    /// Existing links repointed or de-duplicated.
    pub updated: usize,
    pub created: usize,
    /// Programs whose level is missing or unrecognised.
    pub skipped: usize,
    /// Programs with a known level but no suitable office in the college.
    pub unmatched: usize,
    /// Links left in place that point at an office of the other level.
    pub warnings: Vec<String>,
}

pub async fn relink_programs_by_level(
    store: &dyn DirectoryStore,
    college_id: i64,
) -> Result<RelinkStats, PersistenceError> {
    let departments = store.list_college_departments(Some(college_id)).await?;
    let programs = store.list_programs(college_id).await?;
    let mut stats = RelinkStats::default();

    for program in programs {
        stats.processed += 1;
        let Some(category) = classify_level(&program.level) else {
            debug!("Program {} has no recognised level ({:?})", program.id, program.level);
            stats.skipped += 1;
            continue;
        };
        let eligible = eligible_departments(college_id, Some(category), &departments);
        let Some(target) = level_inferred_match(category, &eligible)
            .or_else(|| generic_admissions_match(category, &eligible))
        else {
            warn!(
                "No {:?} office in college {} for program {} ({})",
                category, college_id, program.id, program.name
            );
            stats.unmatched += 1;
            for link in store.list_program_links(program.id).await? {
                let Some(cd) = departments
                    .iter()
                    .find(|d| d.college_department_id == link.college_department_id)
                else {
                    continue;
                };
                if !is_compatible(Some(category), &cd.name) {
                    stats.warnings.push(format!(
                        "program {} ({}, {}) is still linked to '{}'",
                        program.id, program.name, program.level, cd.name
                    ));
                }
            }
            continue;
        };

        let links: Vec<_> = store
            .list_program_links(program.id)
            .await?
            .into_iter()
            .filter(|l| l.college_id == college_id)
            .collect();

        match links.split_first() {
            Some((keep, duplicates)) => {
                let mut changed = false;
                if keep.college_department_id != target.college_department_id {
                    store
                        .update_program_link(keep.id, target.college_department_id)
                        .await?;
                    changed = true;
                }
                for dup in duplicates {
                    store.delete_program_link(dup.id).await?;
                    changed = true;
                }
                if changed {
                    info!("Relinked program {} to {}", program.id, target.name);
                    stats.updated += 1;
                }
            }
            None => {
                store
                    .insert_program_link(program.id, college_id, target.college_department_id)
                    .await?;
                info!("Linked program {} to {}", program.id, target.name);
                stats.created += 1;
            }
        }
    }

    info!(
        "Relink for college {}: {} processed, {} updated, {} created, {} skipped, {} unmatched",
        college_id, stats.processed, stats.updated, stats.created, stats.skipped, stats.unmatched
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::store::MemoryStore;
    use crate::types::FieldMap;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_relink_programs_by_level() {
        let store = MemoryStore::new();
        let college = store.insert_college(&fields(&[("CollegeName", "A")])).await.unwrap();
        let ug = store
            .insert_department(college, &fields(&[("DepartmentName", "Undergraduate Admissions")]))
            .await
            .unwrap();
        let grad = store
            .insert_department(college, &fields(&[("DepartmentName", "Graduate Admissions")]))
            .await
            .unwrap();

        let ms = store
            .insert_program(college, &fields(&[("ProgramName", "MS Physics"), ("Level", "Master's")]), None)
            .await
            .unwrap();
        let ba = store
            .insert_program(college, &fields(&[("ProgramName", "BA History"), ("Level", "Bachelor")]), None)
            .await
            .unwrap();
        store
            .insert_program(college, &fields(&[("ProgramName", "Workshop"), ("Level", "")]), None)
            .await
            .unwrap();

        // Wrong office plus a duplicate for the graduate program.
        store
            .insert_program_link(ms.program_id, college, ug.college_department_id)
            .await
            .unwrap();
        store
            .insert_program_link(ms.program_id, college, ug.college_department_id)
            .await
            .unwrap();

        let stats = relink_programs_by_level(&store, college).await.unwrap();
        assert_eq!(
            stats,
            RelinkStats {
                processed: 3,
                updated: 1,
                created: 1,
                skipped: 1,
                unmatched: 0,
                warnings: Vec::new(),
            }
        );

        let ms_links = store.list_program_links(ms.program_id).await.unwrap();
        assert_eq!(ms_links.len(), 1);
        assert_eq!(ms_links[0].college_department_id, grad.college_department_id);
        let ba_links = store.list_program_links(ba.program_id).await.unwrap();
        assert_eq!(ba_links[0].college_department_id, ug.college_department_id);

        let again = relink_programs_by_level(&store, college).await.unwrap();
        assert_eq!((again.updated, again.created), (0, 0));
    }

    #[tokio::test]
    async fn test_graduate_program_without_graduate_office_is_unmatched() {
        let store = MemoryStore::new();
        let college = store.insert_college(&fields(&[("CollegeName", "A")])).await.unwrap();
        store
            .insert_department(college, &fields(&[("DepartmentName", "Undergraduate Admissions")]))
            .await
            .unwrap();
        let phd = store
            .insert_program(college, &fields(&[("ProgramName", "PhD Chemistry"), ("Level", "Ph.D.")]), None)
            .await
            .unwrap();

        let stats = relink_programs_by_level(&store, college).await.unwrap();
        assert_eq!(stats.unmatched, 1);
        assert!(stats.warnings.is_empty());
        assert!(store.list_program_links(phd.program_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mislinked_unmatched_program_is_reported() {
        let store = MemoryStore::new();
        let college = store.insert_college(&fields(&[("CollegeName", "A")])).await.unwrap();
        let ug = store
            .insert_department(college, &fields(&[("DepartmentName", "Undergraduate Admissions")]))
            .await
            .unwrap();
        let ms = store
            .insert_program(
                college,
                &fields(&[("ProgramName", "MS Physics"), ("Level", "Master's")]),
                Some(ug.college_department_id),
            )
            .await
            .unwrap();

        let stats = relink_programs_by_level(&store, college).await.unwrap();
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.warnings.len(), 1);
        assert!(stats.warnings[0].contains("Undergraduate Admissions"));
        // The link is reported, not removed.
        assert_eq!(store.list_program_links(ms.program_id).await.unwrap().len(), 1);
    }
}

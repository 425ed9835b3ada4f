//! Side panel showing the selected site.
//!
//! The panel is a projection of [`Selection`]: it holds no state of its
//! own and renders nothing while the selection is empty.

use crate::features::popup::{escape_html, presence_label};
use crate::model::{GeoPoint, SiteRecord};

pub const DISMISS_ACTION: &str = "dismiss";

/// Display fields copied out of a record when it is selected.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteDetails {
    pub id: String,
    pub name: String,
    pub date: String,
    pub organizer: String,
    pub volunteers: u32,
    pub site_type: String,
    pub has_microplastics: bool,
    pub primary_count: u32,
    pub secondary_count: u32,
    pub mesoplastic_count: u32,
    pub location: GeoPoint,
}

impl SiteDetails {
    pub fn from_record(record: &SiteRecord) -> Self {
        SiteDetails {
            id: record.id.clone(),
            name: record.name.clone(),
            date: record.date.clone(),
            organizer: record.organizer.clone(),
            volunteers: record.volunteers,
            site_type: record.site_type.clone(),
            has_microplastics: record.has_microplastics,
            primary_count: record.primary_count,
            secondary_count: record.secondary_count,
            mesoplastic_count: record.mesoplastic_count,
            location: record.location,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Selection {
    #[default]
    Empty,
    Selected(SiteDetails),
}

#[derive(Clone, Debug, Default)]
pub struct DetailPanel {
    selection: Selection,
}

impl DetailPanel {
    /// Replaces whatever was selected before.
    pub fn select(&mut self, details: SiteDetails) {
        self.selection = Selection::Selected(details);
    }

    pub fn clear(&mut self) {
        if self.is_visible() {
            tracing::debug!("Selection cleared");
        }
        self.selection = Selection::Empty;
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.selection, Selection::Selected(_))
    }

    pub fn render(&self) -> Option<String> {
        let Selection::Selected(details) = &self.selection else {
            return None;
        };

        Some(format!(
            concat!(
                r#"<aside class="site-detail">"#,
                r#"<button type="button" class="site-detail-close" data-action="{action}" aria-label="Cerrar">×</button>"#,
                "<h2>{name}</h2>",
                r#"<p class="site-detail-date">{date}</p>"#,
                r#"<p class="site-detail-presence">{presence}</p>"#,
                "<ul>",
                "<li><strong>{primary}</strong> microplásticos primarios</li>",
                "<li><strong>{secondary}</strong> microplásticos secundarios</li>",
                "<li><strong>{meso}</strong> mesoplásticos</li>",
                "</ul>",
                "<p>Organizado por <strong>{org}</strong> con <strong>{volunteers}</strong> voluntarios.</p>",
                "<p>El sitio se caracteriza por ser de <strong>{site_type}</strong>.</p>",
                "</aside>"
            ),
            action = DISMISS_ACTION,
            name = escape_html(&details.name),
            date = escape_html(&details.date),
            presence = presence_label(details.has_microplastics),
            primary = details.primary_count,
            secondary = details.secondary_count,
            meso = details.mesoplastic_count,
            org = escape_html(&details.organizer),
            volunteers = details.volunteers,
            site_type = escape_html(&details.site_type),
        ))
    }
}

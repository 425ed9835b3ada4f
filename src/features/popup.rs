use crate::model::SiteRecord;

pub const PRESENT_LABEL: &str = "HAY MICROPLÁSTICOS";
pub const ABSENT_LABEL: &str = "No hay microplásticos";

pub fn presence_label(has_microplastics: bool) -> &'static str {
    if has_microplastics {
        PRESENT_LABEL
    } else {
        ABSENT_LABEL
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Popup content bound to a marker.
#[derive(Clone, Debug, PartialEq)]
pub struct Popup {
    html: String,
}

impl Popup {
    pub fn for_record(record: &SiteRecord) -> Self {
        let html = format!(
            concat!(
                r#"<div class="site-popup">"#,
                "<h3>{name}</h3>",
                "<ul>",
                "<li><strong>Fecha:</strong> {date}</li>",
                "<li><strong>Id:</strong> {id}</li>",
                "<li><strong>{presence}</strong></li>",
                "<li><strong>{primary}</strong> microplásticos primarios</li>",
                "<li><strong>{secondary}</strong> microplásticos secundarios</li>",
                "<li><strong>{meso}</strong> mesoplásticos</li>",
                "<li>Organizado por <strong>{org}</strong> con <strong>{volunteers}</strong> voluntarios.</li>",
                "<li>El sitio se caracteriza por ser de <strong>{site_type}</strong>.</li>",
                "<li><strong>Coordenadas:</strong> ({lat}, {lng})</li>",
                "</ul>",
                "</div>"
            ),
            name = escape_html(&record.name),
            date = escape_html(&record.date),
            id = escape_html(&record.id),
            presence = presence_label(record.has_microplastics),
            primary = record.primary_count,
            secondary = record.secondary_count,
            meso = record.mesoplastic_count,
            org = escape_html(&record.organizer),
            volunteers = record.volunteers,
            site_type = escape_html(&record.site_type),
            lat = record.location.lat,
            lng = record.location.lng,
        );
        Popup { html }
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GeoPoint;

    fn record() -> SiteRecord {
        SiteRecord {
            id: "12".into(),
            date: "2021-03-14".into(),
            organizer: "Proyecto Sub".into(),
            name: "Playa Unión".into(),
            site_type: "playa arenosa".into(),
            volunteers: 8,
            location: GeoPoint::new(-42.77, -65.03),
            has_microplastics: true,
            primary_count: 3,
            secondary_count: 41,
            mesoplastic_count: 5,
            delivery_radius: None,
        }
    }

    #[test]
    fn test_popup_lists_all_fields() {
        let popup = Popup::for_record(&record());
        let html = popup.html();
        assert!(html.contains("<h3>Playa Unión</h3>"));
        assert!(html.contains("<strong>Fecha:</strong> 2021-03-14"));
        assert!(html.contains("<strong>Id:</strong> 12"));
        assert!(html.contains("<strong>HAY MICROPLÁSTICOS</strong>"));
        assert!(html.contains("<strong>3</strong> microplásticos primarios"));
        assert!(html.contains("<strong>41</strong> microplásticos secundarios"));
        assert!(html.contains("<strong>5</strong> mesoplásticos"));
        assert!(html.contains(
            "Organizado por <strong>Proyecto Sub</strong> con <strong>8</strong> voluntarios."
        ));
        assert!(html.contains("ser de <strong>playa arenosa</strong>."));
        assert!(html.contains("(-42.77, -65.03)"));
    }

    #[test]
    fn test_absent_label() {
        let mut site = record();
        site.has_microplastics = false;
        assert!(Popup::for_record(&site).html().contains(ABSENT_LABEL));
        assert!(!Popup::for_record(&site).html().contains(PRESENT_LABEL));
    }

    #[test]
    fn test_text_is_escaped() {
        let mut site = record();
        site.name = "<script>alert('x')</script>".into();
        site.organizer = "A & B".into();
        let popup = Popup::for_record(&site);
        assert!(!popup.html().contains("<script>"));
        assert!(popup.html().contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(popup.html().contains("A &amp; B"));
    }
}

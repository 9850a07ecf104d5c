//! Card renderer – a pure function from an employee and one printable side
//! to a [`RenderDescriptor`].
//!
//! Which photo appears where is a rule table (see [`photo_source`]); the
//! same employee produces different images on portrait and landscape
//! fronts. Missing data renders as an explicit label so QA can tell "empty"
//! from "broken".

use crate::codec::{profile_url, vcard, CodecService, ErrorCorrection};
use crate::descriptor::{
    block, fit_group, image, text, FitRequest, ImageKind, Node, RenderDescriptor,
};
use crate::employee::{non_blank, EmployeeRecord};
use crate::variant::{PageOrientation, Side, TemplateVariant};

/// Name lines start at this size and shrink to fit two lines.
pub const NAME_BASE_PX: f32 = 20.0;
pub const NAME_FIT: FitRequest = FitRequest {
    max_lines: 2,
    min_font_px: 11.0,
    step_px: 1.0,
};

/// Codec images are requested at print density, not surface density.
const CODEC_OVERSAMPLE: u32 = 3;

pub const NO_PHOTO: &str = "NO PHOTO";
pub const NO_SIGNATURE: &str = "NO SIGNATURE";
pub const MISSING_NAME: &str = "MISSING NAME";
pub const MISSING_POSITION: &str = "MISSING POSITION";
pub const MISSING_ID_NUMBER: &str = "MISSING ID NUMBER";
pub const MISSING_CONTACT: &str = "MISSING EMERGENCY CONTACT";
pub const MISSING_PHONE: &str = "MISSING PHONE";

/// Photo printed on `variant`, if any.
///
/// Portrait fronts prefer the AI-generated photo. Landscape fronts only ever
/// use the original upload. Backs carry no photo.
pub fn photo_source<'a>(employee: &'a EmployeeRecord, variant: &TemplateVariant) -> Option<&'a str> {
    match (variant.side, variant.orientation()) {
        (Side::Back, _) => None,
        (Side::Front, PageOrientation::Portrait) => employee.preferred_photo(),
        (Side::Front, PageOrientation::Landscape) => employee.original_photo(),
    }
}

#[derive(Debug, Clone)]
pub struct CardRenderer {
    codec: CodecService,
    issuer: String,
    profile_base_url: String,
}

impl CardRenderer {
    pub fn new(codec: CodecService, issuer: &str, profile_base_url: &str) -> Self {
        Self {
            codec,
            issuer: issuer.to_string(),
            profile_base_url: profile_base_url.to_string(),
        }
    }

    pub fn render(&self, employee: &EmployeeRecord, variant: &TemplateVariant) -> RenderDescriptor {
        let (w, h) = variant.geometry.surface_size();
        let surface = format!("width: {w}px; height: {h}px");
        let root = match (variant.orientation(), variant.side) {
            (PageOrientation::Portrait, Side::Front) => self.portrait_front(employee, variant, &surface),
            (PageOrientation::Portrait, Side::Back) => self.portrait_back(employee, &surface),
            (PageOrientation::Landscape, Side::Front) => self.landscape_front(employee, variant, &surface),
            (PageOrientation::Landscape, Side::Back) => self.landscape_back(employee, &surface),
        };
        RenderDescriptor {
            variant: *variant,
            root,
        }
    }

    fn portrait_front(&self, e: &EmployeeRecord, variant: &TemplateVariant, surface: &str) -> Node {
        block(
            "flex flex-col items-center bg-white",
            surface,
            vec![
                self.header(),
                photo_slot(photo_source(e, variant), 96, 112),
                name_group(e, 184),
                position_line(e),
                signature_slot(e, 100, 28),
                self.barcode(e, 160, 30),
            ],
        )
    }

    fn portrait_back(&self, e: &EmployeeRecord, surface: &str) -> Node {
        block(
            "flex flex-col items-center bg-white",
            surface,
            vec![
                block(
                    "w-full bg-blue-900 py-2",
                    "",
                    vec![text("text-sm font-bold text-white text-center", "IN CASE OF EMERGENCY")],
                ),
                emergency_block(e, 184),
                block(
                    "flex flex-col items-center mt-3",
                    "",
                    vec![
                        image(
                            96,
                            96,
                            self.codec.qr_url(&vcard(e), 96 * CODEC_OVERSAMPLE, ErrorCorrection::Medium),
                            ImageKind::Qr,
                        ),
                        text("text-2xs text-gray-500 mt-1", "Scan to save contact"),
                    ],
                ),
                self.return_notice(184),
            ],
        )
    }

    fn landscape_front(&self, e: &EmployeeRecord, variant: &TemplateVariant, surface: &str) -> Node {
        block(
            "flex flex-col bg-white",
            surface,
            vec![
                self.header(),
                block(
                    "flex flex-row items-start px-3 mt-2 gap-3",
                    "",
                    vec![
                        block(
                            "flex flex-col items-center gap-1",
                            "",
                            vec![
                                photo_slot(photo_source(e, variant), 88, 100),
                                signature_slot(e, 88, 22),
                            ],
                        ),
                        block(
                            "flex flex-col flex-1",
                            "",
                            vec![
                                name_group(e, 200),
                                position_line(e),
                                text("text-xs font-bold text-red-600 uppercase mt-1", "Field Staff"),
                                block("mt-2", "", vec![self.barcode(e, 196, 28)]),
                            ],
                        ),
                    ],
                ),
            ],
        )
    }

    fn landscape_back(&self, e: &EmployeeRecord, surface: &str) -> Node {
        let profile = profile_url(&self.profile_base_url, e);
        block(
            "flex flex-row items-center bg-white px-3 gap-3",
            surface,
            vec![
                block(
                    "flex flex-col items-center",
                    "",
                    vec![
                        image(
                            96,
                            96,
                            self.codec.qr_url(&profile, 96 * CODEC_OVERSAMPLE, ErrorCorrection::Quartile),
                            ImageKind::Qr,
                        ),
                        text("text-2xs text-gray-500 mt-1", "Scan to verify"),
                    ],
                ),
                block(
                    "flex flex-col flex-1",
                    "",
                    vec![
                        text("text-sm font-bold text-blue-900", "IN CASE OF EMERGENCY"),
                        emergency_block(e, 190),
                        self.return_notice(190),
                    ],
                ),
            ],
        )
    }

    fn header(&self) -> Node {
        block(
            "w-full bg-blue-900 py-2",
            "",
            vec![text(
                "text-sm font-bold text-white text-center uppercase",
                self.issuer.as_str(),
            )],
        )
    }

    fn barcode(&self, e: &EmployeeRecord, w: u32, h: u32) -> Node {
        let id_number = e.id_number.trim();
        if id_number.is_empty() {
            return placeholder(MISSING_ID_NUMBER, w, h);
        }
        block(
            "flex flex-col items-center mt-1",
            "",
            vec![
                image(
                    w,
                    h,
                    self.codec
                        .barcode_url(id_number, w * CODEC_OVERSAMPLE, h * CODEC_OVERSAMPLE),
                    ImageKind::Barcode,
                ),
                text("text-xs font-bold text-center", id_number),
            ],
        )
    }

    fn return_notice(&self, width: u32) -> Node {
        block(
            "mt-3",
            &format!("width: {width}px"),
            vec![text(
                "text-2xs text-gray-500 text-center",
                format!(
                    "This card is property of {}. If found, please return it to the nearest office.",
                    self.issuer
                ),
            )],
        )
    }
}

fn photo_slot(src: Option<&str>, w: u32, h: u32) -> Node {
    match src {
        Some(src) => block(
            "border border-gray-300 mt-2",
            "",
            vec![image(w, h, src, ImageKind::Photo)],
        ),
        None => block("mt-2", "", vec![placeholder(NO_PHOTO, w, h)]),
    }
}

fn signature_slot(e: &EmployeeRecord, w: u32, h: u32) -> Node {
    match non_blank(&e.signature_url) {
        Some(src) => image(w, h, src, ImageKind::Signature),
        None => placeholder(NO_SIGNATURE, w, h),
    }
}

/// The two printed name lines, shrunk together to at most two rows.
fn name_group(e: &EmployeeRecord, width: u32) -> Node {
    let lines: Vec<String> = [e.name_line_one(), e.name_line_two()]
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect();
    let lines = if lines.is_empty() {
        vec![MISSING_NAME.to_string()]
    } else {
        lines
    };
    fit_group(
        "font-bold text-center text-gray-900 uppercase leading-tight mt-2",
        &format!("width: {width}px; font-size: {NAME_BASE_PX}px"),
        NAME_FIT,
        lines,
    )
}

fn position_line(e: &EmployeeRecord) -> Node {
    let position = e.position.trim();
    text(
        "text-sm text-gray-700 text-center uppercase",
        if position.is_empty() {
            MISSING_POSITION
        } else {
            position
        },
    )
}

fn emergency_block(e: &EmployeeRecord, width: u32) -> Node {
    let contact = &e.emergency;
    let mut rows = vec![
        text(
            "text-base font-bold",
            non_blank(&contact.name).unwrap_or(MISSING_CONTACT),
        ),
        text(
            "text-sm",
            non_blank(&contact.phone).unwrap_or(MISSING_PHONE),
        ),
    ];
    if let Some(address) = non_blank(&contact.address) {
        rows.push(text("text-xs text-gray-700", address));
    }
    block("flex flex-col mt-2 gap-1", &format!("width: {width}px"), rows)
}

/// Labelled box standing in for missing content.
fn placeholder(label: &str, w: u32, h: u32) -> Node {
    block(
        "flex items-center justify-center border border-gray-300 bg-gray-100",
        &format!("width: {w}px; height: {h}px"),
        vec![text("text-2xs font-bold text-gray-500 text-center", label)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employee::EmergencyContact;
    use crate::variant::{select_variants, PageGeometry, VariantId};

    fn renderer() -> CardRenderer {
        CardRenderer::new(
            CodecService::new("https://codec.example.com").unwrap(),
            "Acme Lending",
            "https://hr.example.com/verify",
        )
    }

    fn employee() -> EmployeeRecord {
        EmployeeRecord {
            id: 7,
            id_number: "EMP-0007".into(),
            first_name: "Maria".into(),
            middle_name: Some("Luna".into()),
            last_name: "Santos".into(),
            position: "Field Officer".into(),
            role_subtype: Some("Reprocessor".into()),
            photo_url: Some("https://img/orig.png".into()),
            ai_photo_url: Some("https://img/ai.png".into()),
            signature_url: Some("https://img/sig.png".into()),
            emergency: EmergencyContact {
                name: Some("Jose Santos".into()),
                phone: Some("0917 000 0000".into()),
                address: None,
            },
            ..Default::default()
        }
    }

    fn variant(orientation: PageOrientation, side: Side) -> TemplateVariant {
        TemplateVariant {
            id: VariantId::Primary,
            side,
            geometry: PageGeometry::for_orientation(orientation),
        }
    }

    fn photos(d: &RenderDescriptor) -> Vec<&str> {
        d.images()
            .into_iter()
            .filter(|(_, k)| *k == ImageKind::Photo)
            .map(|(src, _)| src)
            .collect()
    }

    #[test]
    fn portrait_front_prefers_ai_photo() {
        let d = renderer().render(&employee(), &variant(PageOrientation::Portrait, Side::Front));
        assert_eq!(photos(&d), vec!["https://img/ai.png"]);
    }

    #[test]
    fn landscape_front_never_uses_ai_photo() {
        let r = renderer();
        let d = r.render(&employee(), &variant(PageOrientation::Landscape, Side::Front));
        assert_eq!(photos(&d), vec!["https://img/orig.png"]);

        let mut no_upload = employee();
        no_upload.photo_url = None;
        let d = r.render(&no_upload, &variant(PageOrientation::Landscape, Side::Front));
        assert!(photos(&d).is_empty());
        assert!(d.texts().contains(&NO_PHOTO));
    }

    #[test]
    fn backs_have_qr_but_no_photo() {
        for orientation in [PageOrientation::Portrait, PageOrientation::Landscape] {
            let d = renderer().render(&employee(), &variant(orientation, Side::Back));
            assert!(photos(&d).is_empty());
            assert_eq!(
                d.images().iter().filter(|(_, k)| *k == ImageKind::Qr).count(),
                1
            );
            assert!(d.texts().contains(&"Jose Santos"));
        }
    }

    #[test]
    fn landscape_back_qr_points_at_profile() {
        let d = renderer().render(&employee(), &variant(PageOrientation::Landscape, Side::Back));
        let (qr, _) = d.images()[0];
        assert!(qr.contains("hr.example.com%2Fverify%2FEMP-0007"), "{qr}");
    }

    #[test]
    fn missing_fields_render_labels() {
        let e = EmployeeRecord {
            id: 1,
            ..Default::default()
        };
        let front = renderer().render(&e, &variant(PageOrientation::Portrait, Side::Front));
        let texts = front.texts();
        for label in [NO_PHOTO, NO_SIGNATURE, MISSING_NAME, MISSING_POSITION, MISSING_ID_NUMBER] {
            assert!(texts.contains(&label), "missing {label}");
        }
        assert!(front.images().is_empty());

        let back = renderer().render(&e, &variant(PageOrientation::Portrait, Side::Back));
        assert!(back.texts().contains(&MISSING_CONTACT));
    }

    #[test]
    fn name_requests_fitting_instead_of_truncation() {
        let d = renderer().render(&employee(), &variant(PageOrientation::Portrait, Side::Front));
        let html = d.to_html();
        assert!(html.contains("data-fit-lines=\"2\""));
        assert!(html.contains("data-fit-min=\"11\""));
        assert!(d.texts().contains(&"Maria L."));
        assert!(d.texts().contains(&"Santos"));
    }

    #[test]
    fn same_employee_same_descriptor() {
        let r = renderer();
        for v in select_variants(&employee()) {
            assert_eq!(r.render(&employee(), &v), r.render(&employee(), &v));
        }
    }
}

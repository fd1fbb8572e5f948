//! A scripted copy of the portal's pages, wired with the default selectors.

use super::fake_driver::{Action, FakeDriver, NodeId};
use crate::config::PortalConfig;

pub const AUTHENTICATED_URL: &str = "https://portalcf.cloud.afip.gob.ar/portal/app/";

#[derive(Debug, Clone)]
pub enum LoginBehaviour {
    Accepts,
    /// The credential step shows this banner and stays on the login page.
    RejectsCredential(&'static str),
    /// The id step shows this banner instead of the credential field.
    RejectsId(&'static str),
}

/// What activating the first search result does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOpens {
    NewWindow,
    SameWindow,
    /// The click is swallowed; only the deep link reaches the report.
    Nowhere,
}

#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub title: &'static str,
    /// One entry per icon: the panel headings it opens ("" for none).
    pub icons: Vec<Vec<&'static str>>,
}

impl SectionSpec {
    pub fn new(title: &'static str, icons: Vec<Vec<&'static str>>) -> Self {
        Self { title, icons }
    }
}

#[derive(Debug, Clone)]
pub struct SiteSpec {
    pub login: LoginBehaviour,
    /// Labels shown in the year window initially
    pub years: Vec<&'static str>,
    /// Labels revealed by the previous-years arrow
    pub earlier_years: Vec<&'static str>,
    pub report_opens: ReportOpens,
    pub sections: Vec<SectionSpec>,
}

impl Default for SiteSpec {
    fn default() -> Self {
        Self {
            login: LoginBehaviour::Accepts,
            years: vec!["2022", "2023", "2024"],
            earlier_years: Vec::new(),
            report_opens: ReportOpens::NewWindow,
            sections: vec![SectionSpec::new("Bienes Personales", vec![vec!["Detalle"]])],
        }
    }
}

/// Handles to the interesting nodes of a built site
#[derive(Debug, Default)]
pub struct Site {
    pub password: NodeId,
    pub banner: NodeId,
    pub icons: Vec<NodeId>,
    pub panels: Vec<NodeId>,
    pub print_buttons: Vec<NodeId>,
}

pub fn build(driver: &FakeDriver, spec: &SiteSpec) -> Site {
    let portal = PortalConfig::default();
    let mut site = Site::default();

    driver.add(&portal.username_field);
    site.banner = driver.add(&portal.error_banners[0]).hidden().id();
    site.password = driver.add(&portal.password_field).hidden().id();
    let next = driver.add(&portal.username_submit);
    let submit = driver.add(&portal.password_submit);
    match &spec.login {
        LoginBehaviour::Accepts => {
            next.on_click(Action::Show(site.password));
            submit.on_click(Action::Navigate(AUTHENTICATED_URL.to_string()));
        }
        LoginBehaviour::RejectsCredential(message) => {
            next.on_click(Action::Show(site.password));
            driver.node(site.banner).text(message);
            submit.on_click(Action::Show(site.banner));
        }
        LoginBehaviour::RejectsId(message) => {
            driver.node(site.banner).text(message);
            next.on_click(Action::Show(site.banner));
        }
    }

    driver.add(&portal.search_input);
    driver.add(&portal.search_results);
    let report_url = portal.report_deep_link.clone();
    let first_result = driver.add(&portal.first_search_result);
    match spec.report_opens {
        ReportOpens::NewWindow => {
            first_result.on_click(Action::OpenWindow {
                handle: "report".to_string(),
                url: report_url,
            });
        }
        ReportOpens::SameWindow => {
            first_result.on_click(Action::Navigate(report_url));
        }
        ReportOpens::Nowhere => {}
    }

    build_years(driver, &portal, spec);

    for section in &spec.sections {
        let root = driver.add(&portal.sections).id();
        driver.add_within(root, &portal.section_title).text(section.title);
        for headings in &section.icons {
            let icon = driver.add_within(root, &portal.section_icons).id();
            let mut opened = Vec::new();
            for heading in headings {
                let panel = driver.add(&portal.detail_panels).hidden().id();
                driver.add_within(panel, &portal.panel_heading).text(heading);
                let print = driver.add_within(panel, &portal.print_buttons).id();
                driver.node(icon).on_click(Action::Show(panel));
                opened.push(panel);
                site.print_buttons.push(print);
            }
            // any close button dismisses everything the icon opened
            for &panel in &opened {
                let mut close = driver.add_within(panel, &portal.panel_close);
                for &other in &opened {
                    close = close.on_click(Action::Hide(other));
                }
            }
            site.panels.extend(opened);
            site.icons.push(icon);
        }
    }
    site
}

fn build_years(driver: &FakeDriver, portal: &PortalConfig, spec: &SiteSpec) {
    let button = |year: &str| {
        driver
            .add(&portal.year_buttons)
            .attr(&portal.year_attribute, year)
            .text(year)
    };
    let current: Vec<NodeId> = spec.years.iter().map(|y| button(y).id()).collect();
    let earlier: Vec<NodeId> = spec
        .earlier_years
        .iter()
        .map(|y| button(y).hidden().id())
        .collect();

    let disabled = format!("left-button {}", portal.disabled_arrow_class);
    let left = driver.add(&portal.previous_years_arrow);
    if earlier.is_empty() {
        left.attr("class", &disabled);
    } else {
        let mut left = left.attr("class", "left-button");
        for id in &current {
            left = left.on_click(Action::Hide(*id));
        }
        for id in &earlier {
            left = left.on_click(Action::Show(*id));
        }
        let arrow = left.id();
        driver.node(arrow).on_click(Action::SetClass(arrow, disabled));
    }
    driver
        .add(&portal.next_years_arrow)
        .attr("class", &format!("right-button {}", portal.disabled_arrow_class));
}

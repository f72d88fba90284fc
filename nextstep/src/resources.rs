use serde::Serialize;

/// An official portal listed in the resources directory
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub title: &'static str,
    pub description: &'static str,
    pub url: &'static str,
    pub category: &'static str,
}

pub const RESOURCES: [Resource; 6] = [
    Resource {
        title: "National Career Service (NCS)",
        description: "Government job portal with career counseling and job search",
        url: "https://ncs.gov.in",
        category: "Jobs & Internships",
    },
    Resource {
        title: "AICTE Portal",
        description: "Technical education programs, approvals, and student resources",
        url: "https://aicte-india.org",
        category: "Education",
    },
    Resource {
        title: "Skill India",
        description: "Free skill development courses and certification programs",
        url: "https://skillindia.gov.in",
        category: "Skill Development",
    },
    Resource {
        title: "MyGov Opportunities",
        description: "Government schemes, internships, and student programs",
        url: "https://mygov.in",
        category: "Government Schemes",
    },
    Resource {
        title: "Ministry of Education",
        description: "Latest education policies, scholarships, and announcements",
        url: "https://mhrd.gov.in",
        category: "Education",
    },
    Resource {
        title: "PM Internship Scheme",
        description: "Internship opportunities in top Indian companies",
        url: "https://pminternship.mca.gov.in",
        category: "Internships",
    },
];

pub fn all() -> &'static [Resource] {
    &RESOURCES
}

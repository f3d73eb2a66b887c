//! Course buckets.
//!
//! Every submitted design is filed under a course cell in the top cell,
//! chosen from the design's file name.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A submission course.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Course {
    /// The edX photonics course.
    EdX,
    /// UBC ELEC 413.
    Elec413,
    /// SiEPIC passive devices.
    SiepicPassives,
    /// The open electron-beam lithography run. Also the fallback.
    OpenEbl,
}

/// File-name markers, checked in order.
const MARKERS: [(&str, Course); 4] = [
    ("elec413", Course::Elec413),
    ("ebeam", Course::EdX),
    ("openebl", Course::OpenEbl),
    ("siepic_passives", Course::SiepicPassives),
];

impl Course {
    /// All courses, in the order their bucket cells are created.
    pub const ALL: [Course; 4] = [
        Course::EdX,
        Course::Elec413,
        Course::SiepicPassives,
        Course::OpenEbl,
    ];

    /// Picks the course for a design file name.
    ///
    /// Matching is case-insensitive and the first marker found wins.
    /// Unrecognized names fall back to [`Course::OpenEbl`].
    ///
    /// # Example
    ///
    /// ```
    /// # use shuttle::course::Course;
    /// assert_eq!(Course::classify("EBeam_alice_MZI.gds"), Course::EdX);
    /// assert_eq!(Course::classify("ELEC413_ebeam_bob.oas"), Course::Elec413);
    /// assert_eq!(Course::classify("carol.gds"), Course::OpenEbl);
    /// ```
    pub fn classify(file_name: &str) -> Self {
        let lower = file_name.to_lowercase();
        MARKERS
            .iter()
            .find(|(marker, _)| lower.contains(marker))
            .map(|(_, course)| *course)
            .unwrap_or(Course::OpenEbl)
    }

    /// The name of this course's bucket cell.
    pub const fn bucket_name(&self) -> &'static str {
        match self {
            Course::EdX => "edX",
            Course::Elec413 => "ELEC413",
            Course::SiepicPassives => "SiEPIC_Passives",
            Course::OpenEbl => "openEBL",
        }
    }
}

impl Display for Course {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.bucket_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_order_breaks_ties() {
        assert_eq!(Course::classify("openEBL_ebeam_x.gds"), Course::EdX);
        assert_eq!(Course::classify("SiEPIC_Passives_y.gds"), Course::SiepicPassives);
        assert_eq!(Course::classify("openebl_siepic_passives.gds"), Course::OpenEbl);
    }
}

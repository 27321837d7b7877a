//! The organizer showcase rendered on the landing page.
//!
//! Fixed content: there is no input, no persistence and no error state.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrganizerCard {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub image: &'static str,
}

const ORGANIZER_CARDS: [OrganizerCard; 4] = [
    OrganizerCard {
        id: "stellar-west-africa",
        name: "Stellar West Africa",
        description: "Meetups, hackathons and workshops for builders across West Africa.",
        image: "/images/organizers/stellar-west-africa.png",
    },
    OrganizerCard {
        id: "stellar-east-african-community",
        name: "Stellar East African Community",
        description: "Connecting developers and founders throughout East Africa.",
        image: "/images/organizers/stellar-east-african-community.png",
    },
    OrganizerCard {
        id: "stellar-india",
        name: "Stellar India",
        description: "Developer events and community gatherings across India.",
        image: "/images/organizers/stellar-india.png",
    },
    OrganizerCard {
        id: "stellar-portugal",
        name: "Stellar Portugal",
        description: "The Stellar ecosystem's home in Portugal.",
        image: "/images/organizers/stellar-portugal.png",
    },
];

pub fn organizer_cards() -> &'static [OrganizerCard] {
    &ORGANIZER_CARDS
}

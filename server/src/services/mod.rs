pub mod ticketing;

pub use ticketing::TicketingService;

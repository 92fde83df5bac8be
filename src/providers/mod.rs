// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External collaborators: payment processor, email delivery, image hosting.

pub mod images;
pub mod mailer;
pub mod payments;

pub use images::{ImageHost, ImageHostError};
pub use mailer::{Mailer, MailerError, OutgoingEmail};
pub use payments::{ChargeOutcome, ChargeRequest, PaymentError, PaymentGateway};

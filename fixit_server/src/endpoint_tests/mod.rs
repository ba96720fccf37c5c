mod helpers;
mod mocks;

mod orders;
mod partners;
mod payments;
mod promotions;
mod ratings;
